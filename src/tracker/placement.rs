//! Per-slot placement state machine.
//!
//! Each physical slot waits for a part, observes it until it is still,
//! collects orientation samples, and settles on a side label. The slot only
//! returns to waiting once it has been empty for the configured number of
//! frames.

use tracing::{debug, info, warn};

use crate::config::{PlacementConfig, SlotConfig};
use crate::tracker::detection::{Side, TrackedDetection};
use crate::tracker::hysteresis::AbsenceHysteresis;
use crate::tracker::orientation::{OrientationScorer, OrientationScores};
use crate::tracker::raster::Frame;
use crate::tracker::rect::Rect;
use crate::tracker::stability::StabilityGate;
use crate::tracker::track::TrackRegistry;
use crate::tracker::track_state::TrackPhase;

/// Externally visible state of a placement slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Waiting,
    OccupiedProcessing,
    OccupiedDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotColor {
    Ok,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PlacementBoxState {
    pub slot: Side,
    pub state: SlotState,
    pub color: SlotColor,
}

/// Decision taken when a slot settles.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PlacementOutcome {
    pub slot: Side,
    pub track_id: u64,
    /// Side label written to the track
    pub assigned_side: Side,
    /// Whether the part contradicts the slot it sits in
    pub mismatch: bool,
    /// Scores of the final sample, which decide the outcome
    pub scores: OrientationScores,
    /// Share of buffered samples that flagged a mismatch (diagnostic only)
    pub mismatch_percentage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SlotPhase {
    Waiting,
    Observing { track_id: u64 },
    Settled { track_id: u64, mismatch: bool },
}

#[derive(Debug, Clone)]
struct PlacementSlot {
    side: Side,
    region: Rect,
    phase: SlotPhase,
    vacancy: AbsenceHysteresis,
}

impl PlacementSlot {
    fn new(side: Side, region: Rect, empty_frames: u32) -> Self {
        Self {
            side,
            region,
            phase: SlotPhase::Waiting,
            vacancy: AbsenceHysteresis::new(empty_frames),
        }
    }

    fn bound_track(&self) -> Option<u64> {
        match self.phase {
            SlotPhase::Waiting => None,
            SlotPhase::Observing { track_id } | SlotPhase::Settled { track_id, .. } => Some(track_id),
        }
    }

    fn box_state(&self) -> PlacementBoxState {
        let (state, color) = match self.phase {
            SlotPhase::Waiting => (SlotState::Waiting, SlotColor::Ok),
            SlotPhase::Observing { .. } => (SlotState::OccupiedProcessing, SlotColor::Ok),
            SlotPhase::Settled { mismatch, .. } => (
                SlotState::OccupiedDone,
                if mismatch { SlotColor::Alert } else { SlotColor::Ok },
            ),
        };
        PlacementBoxState {
            slot: self.side,
            state,
            color,
        }
    }

    /// Detection whose center lies in the slot, preferring the bound track.
    fn occupant<'a>(&self, detections: &'a [TrackedDetection]) -> Option<&'a TrackedDetection> {
        let mut inside = detections.iter().filter(|d| d.bbox.center_in(&self.region));
        match self.bound_track() {
            Some(id) => {
                let candidates: Vec<&TrackedDetection> = inside.collect();
                candidates
                    .iter()
                    .find(|d| d.track_id == id)
                    .or_else(|| candidates.first())
                    .copied()
            }
            None => inside.next(),
        }
    }
}

/// State machines for the right and left placement slots.
#[derive(Debug, Clone)]
pub struct PlacementStateMachine {
    slots: [PlacementSlot; 2],
    gate: StabilityGate,
    min_dwell_secs: f64,
    required_samples: usize,
    warning_threshold: f32,
}

impl PlacementStateMachine {
    pub fn new(slots: &SlotConfig, placement: &PlacementConfig, gate: StabilityGate) -> Self {
        Self {
            slots: [
                PlacementSlot::new(Side::Right, slots.right, placement.slot_empty_frames),
                PlacementSlot::new(Side::Left, slots.left, placement.slot_empty_frames),
            ],
            gate,
            min_dwell_secs: placement.min_dwell_secs,
            required_samples: placement.required_samples(),
            warning_threshold: placement.warning_threshold,
        }
    }

    pub fn required_samples(&self) -> usize {
        self.required_samples
    }

    pub fn region(&self, slot: Side) -> Rect {
        self.slot(slot).region
    }

    pub fn box_state(&self, slot: Side) -> PlacementBoxState {
        self.slot(slot).box_state()
    }

    pub fn box_states(&self) -> [PlacementBoxState; 2] {
        [self.slots[0].box_state(), self.slots[1].box_state()]
    }

    fn slot(&self, side: Side) -> &PlacementSlot {
        match side {
            Side::Right => &self.slots[0],
            Side::Left => &self.slots[1],
        }
    }

    /// Advance both slots by one frame.
    ///
    /// `detections` must already be confidence-filtered and registered in
    /// `tracks`. Returns the slots that settled during this frame.
    pub fn step(
        &mut self,
        frame: &Frame,
        now: f64,
        detections: &[TrackedDetection],
        tracks: &mut TrackRegistry,
        scorer: &mut dyn OrientationScorer,
    ) -> Vec<PlacementOutcome> {
        let mut outcomes = Vec::new();
        let gate = self.gate;
        let params = StepParams {
            min_dwell_secs: self.min_dwell_secs,
            required_samples: self.required_samples,
            warning_threshold: self.warning_threshold,
        };
        for slot in self.slots.iter_mut() {
            if let Some(outcome) = step_slot(slot, frame, now, detections, tracks, scorer, gate, params) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Return both slots to waiting, dropping observation data.
    pub fn reset(&mut self, tracks: &mut TrackRegistry) {
        for slot in self.slots.iter_mut() {
            release(slot, tracks);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepParams {
    min_dwell_secs: f64,
    required_samples: usize,
    warning_threshold: f32,
}

fn release(slot: &mut PlacementSlot, tracks: &mut TrackRegistry) {
    if let Some(id) = slot.bound_track() {
        if let Some(track) = tracks.get_mut(id) {
            track.reset_observation();
        }
    }
    slot.phase = SlotPhase::Waiting;
    slot.vacancy.reset();
}

#[allow(clippy::too_many_arguments)]
fn step_slot(
    slot: &mut PlacementSlot,
    frame: &Frame,
    now: f64,
    detections: &[TrackedDetection],
    tracks: &mut TrackRegistry,
    scorer: &mut dyn OrientationScorer,
    gate: StabilityGate,
    params: StepParams,
) -> Option<PlacementOutcome> {
    let occupant = slot.occupant(detections).cloned();
    slot.vacancy.record(occupant.is_some());

    let Some(det) = occupant else {
        if slot.vacancy.is_expired() && slot.phase != SlotPhase::Waiting {
            info!(slot = ?slot.side, "slot empty, waiting for next part");
            release(slot, tracks);
        }
        return None;
    };

    match slot.phase {
        SlotPhase::Waiting => {
            let track = tracks.get_mut(det.track_id)?;
            track.begin_observation(now);
            slot.phase = SlotPhase::Observing {
                track_id: det.track_id,
            };
            debug!(slot = ?slot.side, track_id = det.track_id, "part entered slot");
        }
        SlotPhase::Observing { track_id } if track_id != det.track_id => {
            // The tracker re-identified the part; keep what was collected so far.
            if let Some(previous) = tracks.get(track_id).cloned() {
                if let Some(track) = tracks.get_mut(det.track_id) {
                    track.inherit_observation(&previous);
                }
            }
            if let Some(previous) = tracks.get_mut(track_id) {
                previous.reset_observation();
            }
            debug!(slot = ?slot.side, from = track_id, to = det.track_id, "slot rebound to new track id");
            slot.phase = SlotPhase::Observing {
                track_id: det.track_id,
            };
        }
        SlotPhase::Observing { .. } => {}
        SlotPhase::Settled { .. } => return None,
    }

    observe(slot, frame, now, &det, tracks, scorer, gate, params)
}

#[allow(clippy::too_many_arguments)]
fn observe(
    slot: &mut PlacementSlot,
    frame: &Frame,
    now: f64,
    det: &TrackedDetection,
    tracks: &mut TrackRegistry,
    scorer: &mut dyn OrientationScorer,
    gate: StabilityGate,
    params: StepParams,
) -> Option<PlacementOutcome> {
    let track = tracks.get_mut(det.track_id)?;
    let stable = gate.is_stable(&det.bbox, track.history());
    track.push_history(det.bbox);
    if !stable || now - track.start_time < params.min_dwell_secs {
        return None;
    }

    let scores = scorer.score(frame, slot.side, &slot.region)?;
    let mismatch = scores.is_mismatch(slot.side, params.warning_threshold);
    track.push_result(mismatch, params.required_samples);
    let percentage = track.mismatch_percentage();
    debug!(
        slot = ?slot.side,
        track_id = det.track_id,
        right_score = scores.right,
        left_score = scores.left,
        samples = track.results().len(),
        mismatch_percentage = percentage,
        "orientation sample"
    );

    if track.results().len() < params.required_samples || scores.best() <= params.warning_threshold {
        return None;
    }

    // The final sample decides; the buffer percentage is only reported.
    let assigned_side = scores.preferred_side(slot.side);
    track.assigned_side = Some(assigned_side);
    track.phase = TrackPhase::Settled;
    slot.phase = SlotPhase::Settled {
        track_id: det.track_id,
        mismatch,
    };

    if mismatch {
        warn!(
            slot = ?slot.side,
            track_id = det.track_id,
            ?assigned_side,
            right_score = scores.right,
            left_score = scores.left,
            "wrong part placement detected"
        );
    } else {
        info!(slot = ?slot.side, track_id = det.track_id, ?assigned_side, "placement confirmed");
    }

    Some(PlacementOutcome {
        slot: slot.side,
        track_id: det.track_id,
        assigned_side,
        mismatch,
        scores,
        mismatch_percentage: percentage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<OrientationScores>);

    impl OrientationScorer for Scripted {
        fn score(&mut self, _: &Frame, _: Side, _: &Rect) -> Option<OrientationScores> {
            self.0.pop_front()
        }
    }

    fn machine() -> PlacementStateMachine {
        PlacementStateMachine::new(
            &SlotConfig::default(),
            &PlacementConfig::default(),
            StabilityGate::new(5.0),
        )
    }

    fn in_right_slot(id: u64) -> TrackedDetection {
        TrackedDetection::new(id, 100.0, 250.0, 180.0, 330.0, 0.9, 0)
    }

    fn run(
        sm: &mut PlacementStateMachine,
        tracks: &mut TrackRegistry,
        scorer: &mut dyn OrientationScorer,
        dets: &[TrackedDetection],
        frame_index: u64,
    ) -> Vec<PlacementOutcome> {
        for d in dets {
            tracks.observe(d, frame_index);
        }
        let frame = Frame::blank(640, 480, frame_index as f64 / 30.0);
        sm.step(&frame, frame.timestamp, dets, tracks, scorer)
    }

    #[test]
    fn test_no_sampling_until_history_full() {
        let mut sm = machine();
        let mut tracks = TrackRegistry::new(5);
        let mut scorer = Scripted(VecDeque::from(vec![OrientationScores::new(0.9, 0.2); 10]));
        let det = in_right_slot(7);

        // Frames 0..=4 fill the history; nothing may be sampled yet.
        for i in 0..5 {
            assert!(run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], i).is_empty());
        }
        assert_eq!(scorer.0.len(), 10);
        assert_eq!(sm.box_state(Side::Right).state, SlotState::OccupiedProcessing);
        assert_eq!(sm.box_state(Side::Left).state, SlotState::Waiting);
    }

    #[test]
    fn test_never_settles_before_buffer_is_full() {
        let mut sm = machine();
        let mut tracks = TrackRegistry::new(5);
        let mut scorer = Scripted(VecDeque::from(vec![OrientationScores::new(0.9, 0.2); 10]));
        let det = in_right_slot(7);

        for i in 0..5 {
            run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], i);
        }
        // First sample: buffer holds 1 of 2.
        assert!(run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], 5).is_empty());
        assert_eq!(tracks.get(7).unwrap().phase, TrackPhase::Observing);

        let outcomes = run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], 6);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].assigned_side, Side::Right);
        assert!(!outcomes[0].mismatch);
        assert_eq!(sm.box_state(Side::Right).state, SlotState::OccupiedDone);
        assert_eq!(sm.box_state(Side::Right).color, SlotColor::Ok);
    }

    #[test]
    fn test_low_confidence_samples_keep_observing() {
        let mut sm = machine();
        let mut tracks = TrackRegistry::new(5);
        let mut scorer = Scripted(VecDeque::from(vec![
            OrientationScores::new(0.5, 0.4),
            OrientationScores::new(0.6, 0.3),
            OrientationScores::new(0.7, 0.2),
            OrientationScores::new(0.3, 0.85),
        ]));
        let det = in_right_slot(3);
        let mut settled = Vec::new();
        for i in 0..9 {
            settled.extend(run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], i));
        }
        assert_eq!(settled.len(), 1);
        assert!(settled[0].mismatch);
        assert_eq!(settled[0].assigned_side, Side::Left);
        assert_eq!(tracks.assigned_side(3), Some(Side::Left));
        assert_eq!(sm.box_state(Side::Right).color, SlotColor::Alert);
    }

    #[test]
    fn test_settled_slot_waits_for_empty() {
        let mut sm = machine();
        let mut tracks = TrackRegistry::new(5);
        let mut scorer = Scripted(VecDeque::from(vec![OrientationScores::new(0.9, 0.1); 2]));
        let det = in_right_slot(9);
        for i in 0..7 {
            run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], i);
        }
        assert_eq!(sm.box_state(Side::Right).state, SlotState::OccupiedDone);

        // Still occupied: no re-test.
        assert!(run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], 7).is_empty());

        // Empty frame clears the slot but keeps the side label.
        run(&mut sm, &mut tracks, &mut scorer, &[], 8);
        assert_eq!(sm.box_state(Side::Right).state, SlotState::Waiting);
        assert_eq!(tracks.assigned_side(9), Some(Side::Right));
        assert!(tracks.get(9).unwrap().history().is_empty());
    }

    #[test]
    fn test_unavailable_scores_never_settle() {
        let mut sm = machine();
        let mut tracks = TrackRegistry::new(5);
        let mut scorer = Scripted(VecDeque::new());
        let det = in_right_slot(1);
        for i in 0..20 {
            assert!(run(&mut sm, &mut tracks, &mut scorer, &[det.clone()], i).is_empty());
        }
        assert_eq!(sm.box_state(Side::Right).state, SlotState::OccupiedProcessing);
    }

    #[test]
    fn test_track_id_churn_keeps_samples() {
        let mut sm = machine();
        let mut tracks = TrackRegistry::new(5);
        let mut scorer = Scripted(VecDeque::from(vec![OrientationScores::new(0.9, 0.1); 4]));
        for i in 0..6 {
            run(&mut sm, &mut tracks, &mut scorer, &[in_right_slot(4)], i);
        }
        assert_eq!(tracks.get(4).unwrap().results().len(), 1);

        let outcomes = run(&mut sm, &mut tracks, &mut scorer, &[in_right_slot(5)], 6);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].track_id, 5);
        assert_eq!(tracks.assigned_side(5), Some(Side::Right));
        assert_eq!(tracks.assigned_side(4), None);
    }
}
