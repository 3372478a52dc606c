//! Destinations for the once-per-session summary record.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::tracker::SessionSummary;

pub trait SessionSink {
    type Error;

    fn record(&mut self, summary: &SessionSummary) -> Result<(), Self::Error>;
}

/// Keeps summaries in memory.
impl SessionSink for Vec<SessionSummary> {
    type Error = std::convert::Infallible;

    fn record(&mut self, summary: &SessionSummary) -> Result<(), Self::Error> {
        self.push(summary.clone());
        Ok(())
    }
}

/// Appends one JSON object per session to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionSink for JsonLinesSink {
    type Error = io::Error;

    fn record(&mut self, summary: &SessionSummary) -> Result<(), Self::Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_vec(summary)?;
        line.push(b'\n');
        file.write_all(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::SessionStats;

    #[test]
    fn test_json_lines_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::new(dir.path().join("sessions.jsonl"));
        let mut stats = SessionStats::default();
        stats.start(1.0);
        stats.record_side_change();
        sink.record(&stats.summary("YOLOv8", Some(2.0))).unwrap();
        sink.record(&stats.summary("YOLOv8", Some(3.0))).unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let records: Vec<SessionSummary> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].changed_side_detections, 1);
        assert_eq!(records[1].session_end_time, Some(3.0));
    }
}
