//! Aggregate counters for one operating session.

use serde::{Deserialize, Serialize};

use crate::tracker::detection::Side;
use crate::tracker::events::StickerErrorKind;
use crate::tracker::placement::PlacementOutcome;

/// Running counters, reset at session start.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    total_objects_detected: u64,
    right_side_objects: u64,
    left_side_objects: u64,
    successful_detections: u64,
    failed_detections: u64,
    changed_side_detections: u64,
    left_sticker_errors: u64,
    right_sticker_errors: u64,
    total_processing_secs: f64,
    processed_frames: u64,
    start_time: Option<f64>,
}

/// Flat record emitted once when a session ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_objects_detected: u64,
    pub right_side_objects: u64,
    pub left_side_objects: u64,
    pub successful_detections: u64,
    pub failed_detections: u64,
    pub changed_side_detections: u64,
    pub left_sticker_errors: u64,
    pub right_sticker_errors: u64,
    pub total_processing_time: f64,
    pub average_processing_time: f64,
    pub processed_frames: u64,
    pub ai_model_used: String,
    pub session_start_time: Option<f64>,
    pub session_end_time: Option<f64>,
}

impl SessionStats {
    pub fn start(&mut self, now: f64) {
        *self = Self {
            start_time: Some(now),
            ..Self::default()
        };
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Count a settled placement.
    pub fn record_placement(&mut self, outcome: &PlacementOutcome) {
        self.total_objects_detected += 1;
        match outcome.assigned_side {
            Side::Right => self.right_side_objects += 1,
            Side::Left => self.left_side_objects += 1,
        }
        if outcome.mismatch {
            self.failed_detections += 1;
        } else {
            self.successful_detections += 1;
        }
    }

    pub fn record_side_change(&mut self) {
        self.changed_side_detections += 1;
    }

    /// Sticker errors are counted against the side of the part they sit on.
    pub fn record_sticker_error(&mut self, kind: StickerErrorKind) {
        match kind {
            StickerErrorKind::LeftOnRight => self.right_sticker_errors += 1,
            StickerErrorKind::RightOnLeft => self.left_sticker_errors += 1,
        }
    }

    pub fn record_processing_time(&mut self, secs: f64) {
        self.total_processing_secs += secs;
        self.processed_frames += 1;
    }

    pub fn failed_detections(&self) -> u64 {
        self.failed_detections
    }

    pub fn successful_detections(&self) -> u64 {
        self.successful_detections
    }

    pub fn changed_side_detections(&self) -> u64 {
        self.changed_side_detections
    }

    pub fn summary(&self, model_name: &str, end_time: Option<f64>) -> SessionSummary {
        let average = if self.processed_frames == 0 {
            0.0
        } else {
            self.total_processing_secs / self.processed_frames as f64
        };
        SessionSummary {
            total_objects_detected: self.total_objects_detected,
            right_side_objects: self.right_side_objects,
            left_side_objects: self.left_side_objects,
            successful_detections: self.successful_detections,
            failed_detections: self.failed_detections,
            changed_side_detections: self.changed_side_detections,
            left_sticker_errors: self.left_sticker_errors,
            right_sticker_errors: self.right_sticker_errors,
            total_processing_time: self.total_processing_secs,
            average_processing_time: average,
            processed_frames: self.processed_frames,
            ai_model_used: model_name.to_string(),
            session_start_time: self.start_time,
            session_end_time: end_time,
        }
    }
}
