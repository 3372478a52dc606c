//! Per-tick orchestration of every inspection component.

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::tracker::detection::{StickerObservation, TrackedDetection};
use crate::tracker::events::{FrameReport, TrackLabel, WarningEvent, WarningKind};
use crate::tracker::hysteresis::CleanupTrigger;
use crate::tracker::matching::resolve_sticker_conflicts;
use crate::tracker::orientation::{OrientationScorer, TemplateScorer};
use crate::tracker::placement::PlacementStateMachine;
use crate::tracker::raster::Frame;
use crate::tracker::side_crossing::SideCrossingMonitor;
use crate::tracker::stability::StabilityGate;
use crate::tracker::stats::{SessionStats, SessionSummary};
use crate::tracker::sticker_validator::{LabelledPart, StickerPlacementValidator};
use crate::tracker::track::TrackRegistry;
use crate::tracker::zones::ZoneOccupancyTracker;

/// Placement verification and zone occupancy engine.
///
/// Owns all per-track and per-zone state for one session. Each call to
/// [`process_frame`](Self::process_frame) runs the components in a fixed
/// order: placement slots, side crossing, zone occupancy, cleanup, then
/// sticker validation.
pub struct InspectionEngine {
    config: EngineConfig,
    scorer: Box<dyn OrientationScorer>,
    tracks: TrackRegistry,
    placement: PlacementStateMachine,
    crossing: SideCrossingMonitor,
    zones: ZoneOccupancyTracker,
    stickers: StickerPlacementValidator,
    stats: SessionStats,
    frame_index: u64,
    last_timestamp: Option<f64>,
}

impl InspectionEngine {
    pub fn new(config: EngineConfig, scorer: Box<dyn OrientationScorer>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tracks: TrackRegistry::new(config.stability.history_len),
            placement: PlacementStateMachine::new(
                &config.slots,
                &config.placement,
                StabilityGate::new(config.stability.movement_threshold_px),
            ),
            crossing: SideCrossingMonitor::new(config.slots.right.center().0),
            zones: ZoneOccupancyTracker::new(&config.zones),
            stickers: StickerPlacementValidator::new(&config.stickers),
            stats: SessionStats::default(),
            frame_index: 0,
            last_timestamp: None,
            scorer,
            config,
        })
    }

    /// Build an engine that scores orientation against the configured
    /// reference images. Unreadable templates disable scoring instead of
    /// failing.
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        let scorer = TemplateScorer::from_paths(
            config.templates.right.as_deref(),
            config.templates.left.as_deref(),
        )
        .with_working_size(config.templates.working_size_px);
        Self::new(config, Box::new(scorer))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracks(&self) -> &TrackRegistry {
        &self.tracks
    }

    pub fn zones(&self) -> &ZoneOccupancyTracker {
        &self.zones
    }

    pub fn placement(&self) -> &PlacementStateMachine {
        &self.placement
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Index of the next frame to be processed.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn start_session(&mut self, now: f64) {
        self.reset_state();
        self.stats.start(now);
        info!(model = %self.config.model_name, "inspection session started");
    }

    pub fn record_processing_time(&mut self, secs: f64) {
        self.stats.record_processing_time(secs);
    }

    /// Run one tick.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detections: &[TrackedDetection],
        stickers: &[StickerObservation],
    ) -> FrameReport {
        let now = frame.timestamp;
        if self.stats.start_time().is_none() {
            self.start_session(now);
        }
        let frame_index = self.frame_index;
        let frame_width = frame.width() as f32;
        let mut warnings = Vec::new();

        let live: Vec<TrackedDetection> = detections
            .iter()
            .filter(|d| d.score >= self.config.detection_confidence)
            .cloned()
            .collect();
        for det in &live {
            self.tracks.observe(det, frame_index);
        }

        let placements = self
            .placement
            .step(frame, now, &live, &mut self.tracks, self.scorer.as_mut());
        for outcome in &placements {
            self.stats.record_placement(outcome);
            if outcome.mismatch {
                warnings.push(WarningEvent::new(WarningKind::OrientationMismatch, outcome.track_id, now));
            }
        }

        for det in &live {
            let Some(side) = self.tracks.assigned_side(det.track_id) else {
                continue;
            };
            if self.crossing.check(det.track_id, det.bbox.center().0, side, frame_width) {
                self.stats.record_side_change();
                warnings.push(WarningEvent::new(WarningKind::SideCrossing, det.track_id, now));
            }
        }

        let confident: Vec<StickerObservation> = stickers
            .iter()
            .filter(|s| s.score >= self.config.sticker_confidence)
            .copied()
            .collect();
        let stickers = resolve_sticker_conflicts(&confident, self.config.stickers.conflict_iou);

        self.zones.update_objects(&live, frame_width);
        let sticker_ids = self.zones.update_stickers(&stickers, frame_width);
        self.run_cleanup(frame_index);

        let parts: Vec<LabelledPart> = live
            .iter()
            .filter_map(|d| {
                let side = self.tracks.assigned_side(d.track_id)?;
                Some(LabelledPart {
                    track_id: d.track_id,
                    bbox: d.bbox,
                    side,
                })
            })
            .collect();
        for event in self.stickers.update(now, &parts, &stickers) {
            if let Some(kind) = event.sticker_error {
                self.stats.record_sticker_error(kind);
            }
            warnings.push(event);
        }

        let labels = live
            .iter()
            .map(|d| TrackLabel {
                track_id: d.track_id,
                side: self.tracks.assigned_side(d.track_id),
            })
            .collect();

        self.frame_index += 1;
        self.last_timestamp = Some(now);

        FrameReport {
            frame_index,
            timestamp: now,
            warnings,
            placements,
            zones: self.zones.statuses(),
            slots: self.placement.box_states(),
            active_sticker_warning: self.stickers.active_warning(now),
            labels,
            sticker_ids,
        }
    }

    /// Immediate and periodic zone cleanup, then the track-liveness sweep.
    fn run_cleanup(&mut self, frame_index: u64) {
        let sweep = CleanupTrigger::Every(self.config.zones.sweep_interval_frames);
        let mut cleared = self.zones.cleanup(CleanupTrigger::EveryFrame, frame_index);
        cleared.extend(self.zones.cleanup(sweep, frame_index));
        for cleanup in cleared {
            for id in cleanup.purged {
                self.discard_track(id);
            }
        }

        if sweep.fires_at(frame_index) {
            for id in self
                .tracks
                .stale_ids(frame_index, self.config.zones.track_timeout_frames)
            {
                debug!(track_id = id, "track timed out");
                self.zones.forget_track(id);
                self.discard_track(id);
            }
        }
    }

    fn discard_track(&mut self, track_id: u64) {
        self.tracks.remove(track_id);
        self.crossing.forget(track_id);
        self.stickers.forget(track_id);
    }

    fn reset_state(&mut self) {
        self.placement.reset(&mut self.tracks);
        self.tracks.clear();
        self.crossing.clear();
        self.zones.reset();
        self.stickers.reset();
        self.stats = SessionStats::default();
        self.frame_index = 0;
        self.last_timestamp = None;
    }

    /// End the session: produce the aggregate record and drop all state.
    pub fn finish(&mut self) -> SessionSummary {
        let summary = self
            .stats
            .summary(&self.config.model_name, self.last_timestamp);
        info!(
            total = summary.total_objects_detected,
            successful = summary.successful_detections,
            failed = summary.failed_detections,
            side_changes = summary.changed_side_detections,
            "inspection session finished"
        );
        self.reset_state();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoneConfig;
    use crate::tracker::detection::Side;
    use crate::tracker::orientation::OrientationScores;
    use crate::tracker::rect::Rect;

    struct Fixed(OrientationScores);

    impl OrientationScorer for Fixed {
        fn score(&mut self, _: &Frame, _: Side, _: &Rect) -> Option<OrientationScores> {
            Some(self.0)
        }
    }

    fn engine(right: f32, left: f32) -> InspectionEngine {
        InspectionEngine::new(
            EngineConfig::default(),
            Box::new(Fixed(OrientationScores::new(right, left))),
        )
        .unwrap()
    }

    fn tick(
        engine: &mut InspectionEngine,
        i: u64,
        dets: &[TrackedDetection],
        stickers: &[StickerObservation],
    ) -> FrameReport {
        let frame = Frame::blank(640, 480, i as f64 / 30.0);
        engine.process_frame(&frame, dets, stickers)
    }

    #[test]
    fn test_low_confidence_detections_ignored() {
        let mut e = engine(0.9, 0.1);
        let weak = TrackedDetection::new(1, 100.0, 250.0, 180.0, 330.0, 0.4, 0);
        for i in 0..10 {
            let report = tick(&mut e, i, &[weak.clone()], &[]);
            assert!(report.placements.is_empty());
            assert!(report.zones.iter().all(|z| z.object_count == 0));
        }
        assert!(e.tracks().is_empty());
    }

    #[test]
    fn test_settled_part_crossing_midline_warns_once() {
        let mut e = engine(0.9, 0.1);
        let in_slot = TrackedDetection::new(4, 100.0, 250.0, 180.0, 330.0, 0.9, 0);
        for i in 0..7 {
            tick(&mut e, i, &[in_slot.clone()], &[]);
        }
        assert_eq!(e.tracks().assigned_side(4), Some(Side::Right));

        let mut crossings = 0;
        for i in 7..20 {
            let moved = TrackedDetection::new(4, 400.0, 250.0, 480.0, 330.0, 0.9, 0);
            let report = tick(&mut e, i, &[moved], &[]);
            crossings += report.warnings_of(WarningKind::SideCrossing).count();
        }
        assert_eq!(crossings, 1);
        assert_eq!(e.stats().changed_side_detections(), 1);
    }

    #[test]
    fn test_stale_tracks_release_zone_counts() {
        let config = EngineConfig {
            zones: ZoneConfig {
                sweep_interval_frames: 1,
                track_timeout_frames: 3,
                ..ZoneConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut e = InspectionEngine::new(config, Box::new(TemplateScorer::disabled())).unwrap();
        let a = TrackedDetection::new(1, 20.0, 20.0, 60.0, 60.0, 0.9, 0);
        let b = TrackedDetection::new(2, 40.0, 40.0, 80.0, 80.0, 0.9, 0);
        tick(&mut e, 0, &[a.clone(), b], &[]);
        assert_eq!(e.zones().zone(0).unwrap().object_count(), 2);

        // Track 2 vanishes while track 1 keeps the zone alive.
        for i in 1..6 {
            tick(&mut e, i, &[a.clone()], &[]);
        }
        assert_eq!(e.zones().zone(0).unwrap().object_count(), 1);
        assert!(e.tracks().get(2).is_none());
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let config = EngineConfig {
            zones: ZoneConfig {
                sweep_interval_frames: 0,
                ..ZoneConfig::default()
            },
            ..EngineConfig::default()
        };
        assert!(InspectionEngine::new(config, Box::new(TemplateScorer::disabled())).is_err());
    }

    #[test]
    fn test_id_churn_in_occupied_zone_stays_bounded() {
        let config = EngineConfig {
            zones: ZoneConfig {
                sweep_interval_frames: 1,
                track_timeout_frames: 3,
                ..ZoneConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut e = InspectionEngine::new(config, Box::new(TemplateScorer::disabled())).unwrap();
        let anchor = TrackedDetection::new(999, 20.0, 20.0, 60.0, 60.0, 0.9, 0);
        for i in 0..200u64 {
            let churned = TrackedDetection::new(1000 + i, 30.0, 30.0, 70.0, 70.0, 0.9, 0);
            tick(&mut e, i, &[anchor.clone(), churned], &[]);
        }
        assert!(e.tracks().len() <= 5, "tracks alive: {}", e.tracks().len());
        assert!(e.zones().zone(0).unwrap().object_count() <= 5);
    }

    #[test]
    fn test_associated_sticker_ids_reach_report() {
        let config = EngineConfig {
            zones: ZoneConfig {
                associate_stickers: true,
                ..ZoneConfig::default()
            },
            ..EngineConfig::default()
        };
        let mut e = InspectionEngine::new(config, Box::new(TemplateScorer::disabled())).unwrap();
        let first = StickerObservation::new(100.0, 100.0, 120.0, 120.0, Side::Left, 0.9);
        let moved = StickerObservation::new(104.0, 100.0, 124.0, 120.0, Side::Left, 0.9);
        let a = tick(&mut e, 0, &[], &[first]);
        let b = tick(&mut e, 1, &[], &[moved]);
        assert_eq!(a.sticker_ids, Some(vec![0]));
        assert_eq!(b.sticker_ids, Some(vec![0]));

        let mut plain = engine(0.9, 0.1);
        assert!(tick(&mut plain, 0, &[], &[first]).sticker_ids.is_none());
    }

    #[test]
    fn test_finish_resets_state() {
        let mut e = engine(0.9, 0.1);
        let in_slot = TrackedDetection::new(4, 100.0, 250.0, 180.0, 330.0, 0.9, 0);
        for i in 0..7 {
            tick(&mut e, i, &[in_slot.clone()], &[]);
        }
        let summary = e.finish();
        assert_eq!(summary.successful_detections, 1);
        assert_eq!(summary.right_side_objects, 1);
        assert_eq!(summary.ai_model_used, "YOLOv8");
        assert!(e.tracks().is_empty());
        assert_eq!(e.frame_index(), 0);
    }
}
