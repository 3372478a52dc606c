//! Per-track state owned by the inspection engine for one session.

use std::collections::{HashMap, VecDeque};

use crate::tracker::detection::{Side, TrackedDetection};
use crate::tracker::rect::Rect;
use crate::tracker::stability::BoxHistory;
use crate::tracker::track_state::TrackPhase;

/// Single tracked part.
#[derive(Debug, Clone)]
pub struct Track {
    /// Identity assigned by the external tracker
    pub track_id: u64,
    /// Latest bounding box
    pub bbox: Rect,
    pub class_id: u32,
    /// Latest detection confidence
    pub score: f32,
    /// Orientation decided by a placement slot, if any
    pub assigned_side: Option<Side>,
    pub phase: TrackPhase,
    /// Tick timestamp at which the current observation started
    pub start_time: f64,
    /// Frame index of the last detection
    pub last_seen_frame: u64,
    bbox_history: BoxHistory,
    test_results: VecDeque<bool>,
}

impl Track {
    pub fn new(detection: &TrackedDetection, frame_index: u64, history_len: usize) -> Self {
        Self {
            track_id: detection.track_id,
            bbox: detection.bbox,
            class_id: detection.class_id,
            score: detection.score,
            assigned_side: None,
            phase: TrackPhase::Idle,
            start_time: 0.0,
            last_seen_frame: frame_index,
            bbox_history: BoxHistory::new(history_len),
            test_results: VecDeque::new(),
        }
    }

    pub fn update(&mut self, detection: &TrackedDetection, frame_index: u64) {
        self.bbox = detection.bbox;
        self.class_id = detection.class_id;
        self.score = detection.score;
        self.last_seen_frame = frame_index;
    }

    /// Start observing the part in a slot, discarding earlier observation data.
    pub fn begin_observation(&mut self, now: f64) {
        self.phase = TrackPhase::Observing;
        self.start_time = now;
        self.bbox_history.clear();
        self.test_results.clear();
    }

    /// Take over observation data from a track the slot was following before.
    pub fn inherit_observation(&mut self, previous: &Track) {
        self.phase = previous.phase;
        self.start_time = previous.start_time;
        self.bbox_history = previous.bbox_history.clone();
        self.test_results = previous.test_results.clone();
    }

    /// Drop history and samples; the side label survives.
    pub fn reset_observation(&mut self) {
        self.phase = TrackPhase::Idle;
        self.bbox_history.clear();
        self.test_results.clear();
    }

    pub fn history(&self) -> &BoxHistory {
        &self.bbox_history
    }

    pub fn push_history(&mut self, bbox: Rect) {
        self.bbox_history.push(bbox);
    }

    /// Append a mismatch outcome, keeping at most `capacity` samples.
    pub fn push_result(&mut self, mismatch: bool, capacity: usize) {
        while self.test_results.len() >= capacity.max(1) {
            self.test_results.pop_front();
        }
        self.test_results.push_back(mismatch);
    }

    pub fn results(&self) -> &VecDeque<bool> {
        &self.test_results
    }

    /// Share of buffered samples that flagged a mismatch, in percent.
    pub fn mismatch_percentage(&self) -> f32 {
        if self.test_results.is_empty() {
            return 0.0;
        }
        let wrong = self.test_results.iter().filter(|&&m| m).count();
        wrong as f32 * 100.0 / self.test_results.len() as f32
    }
}

/// Growable table of live tracks keyed by tracker id.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: HashMap<u64, Track>,
    history_len: usize,
}

impl TrackRegistry {
    pub fn new(history_len: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            history_len,
        }
    }

    /// Record a detection, creating the track on first sight.
    pub fn observe(&mut self, detection: &TrackedDetection, frame_index: u64) -> &mut Track {
        let history_len = self.history_len;
        self.tracks
            .entry(detection.track_id)
            .and_modify(|t| t.update(detection, frame_index))
            .or_insert_with(|| Track::new(detection, frame_index, history_len))
    }

    pub fn get(&self, track_id: u64) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    pub fn get_mut(&mut self, track_id: u64) -> Option<&mut Track> {
        self.tracks.get_mut(&track_id)
    }

    pub fn assigned_side(&self, track_id: u64) -> Option<Side> {
        self.tracks.get(&track_id).and_then(|t| t.assigned_side)
    }

    pub fn remove(&mut self, track_id: u64) -> Option<Track> {
        self.tracks.remove(&track_id)
    }

    /// Ids of tracks not detected for more than `timeout_frames` frames.
    pub fn stale_ids(&self, frame_index: u64, timeout_frames: u64) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .tracks
            .values()
            .filter(|t| frame_index.saturating_sub(t.last_seen_frame) > timeout_frames)
            .map(|t| t.track_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(id: u64, x: f32) -> TrackedDetection {
        TrackedDetection::new(id, x, 100.0, x + 50.0, 150.0, 0.9, 0)
    }

    #[test]
    fn test_result_buffer_is_bounded() {
        let mut track = Track::new(&det(1, 0.0), 0, 5);
        track.push_result(true, 2);
        track.push_result(false, 2);
        track.push_result(false, 2);
        assert_eq!(track.results().len(), 2);
        assert_eq!(track.mismatch_percentage(), 0.0);
    }

    #[test]
    fn test_reset_keeps_side() {
        let mut track = Track::new(&det(1, 0.0), 0, 5);
        track.assigned_side = Some(Side::Left);
        track.begin_observation(1.0);
        track.push_history(track.bbox);
        track.push_result(true, 2);
        track.reset_observation();
        assert!(track.history().is_empty());
        assert!(track.results().is_empty());
        assert_eq!(track.phase, TrackPhase::Idle);
        assert_eq!(track.assigned_side, Some(Side::Left));
    }

    #[test]
    fn test_registry_stale_ids() {
        let mut registry = TrackRegistry::new(5);
        registry.observe(&det(1, 0.0), 0);
        registry.observe(&det(2, 100.0), 0);
        registry.observe(&det(2, 105.0), 50);
        assert_eq!(registry.stale_ids(60, 59), vec![1]);
        assert!(registry.stale_ids(60, 60).is_empty());
        assert_eq!(registry.get(2).map(|t| t.bbox.x), Some(105.0));
    }
}
