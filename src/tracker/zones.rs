//! Zone-by-zone occupancy reconciliation between parts and stickers.
//!
//! The frame width is split into equal vertical sections. Parts keep their
//! identity, so their counts move with them across boundaries; stickers
//! don't, so their counts are rebuilt every frame.

use std::collections::HashMap;

use tracing::{info, trace};

use crate::config::ZoneConfig;
use crate::tracker::detection::{StickerObservation, TrackedDetection};
use crate::tracker::events::ZoneStatus;
use crate::tracker::hysteresis::{AbsenceHysteresis, CleanupTrigger};
use crate::tracker::matching::StickerAssociator;

/// One vertical section of the frame.
#[derive(Debug, Clone)]
pub struct Zone {
    pub index: usize,
    object_count: u32,
    sticker_count: u32,
    vacancy: AbsenceHysteresis,
}

impl Zone {
    fn new(index: usize, empty_frame_threshold: u32) -> Self {
        Self {
            index,
            object_count: 0,
            sticker_count: 0,
            vacancy: AbsenceHysteresis::new(empty_frame_threshold),
        }
    }

    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    pub fn sticker_count(&self) -> u32 {
        self.sticker_count
    }

    /// Consecutive frames without a live part in this zone.
    pub fn empty_frames(&self) -> u32 {
        self.vacancy.empty_frames()
    }

    pub fn status(&self) -> ZoneStatus {
        ZoneStatus {
            index: self.index,
            object_count: self.object_count,
            sticker_count: self.sticker_count,
            matched: self.object_count == self.sticker_count,
        }
    }
}

/// A zone that was forcibly emptied by the cleanup rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCleanup {
    pub zone: usize,
    /// Tracks that were still attributed to the zone
    pub purged: Vec<u64>,
}

/// Section index for an x coordinate; the last section absorbs the right edge.
pub fn section_of(x: f32, frame_width: f32, count: usize) -> usize {
    if count == 0 || frame_width <= 0.0 || x <= 0.0 {
        return 0;
    }
    let width = frame_width / count as f32;
    ((x / width).floor() as usize).min(count - 1)
}

#[derive(Debug, Clone)]
pub struct ZoneOccupancyTracker {
    zones: Vec<Zone>,
    object_sections: HashMap<u64, usize>,
    associator: Option<StickerAssociator>,
}

impl ZoneOccupancyTracker {
    pub fn new(config: &ZoneConfig) -> Self {
        let count = config.count.max(1);
        Self {
            zones: (0..count)
                .map(|i| Zone::new(i, config.empty_frame_threshold))
                .collect(),
            object_sections: HashMap::new(),
            associator: config
                .associate_stickers
                .then(|| StickerAssociator::new(config.sticker_match_distance_px)),
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    pub fn section_of_track(&self, track_id: u64) -> Option<usize> {
        self.object_sections.get(&track_id).copied()
    }

    pub fn tracked_objects(&self) -> usize {
        self.object_sections.len()
    }

    pub fn statuses(&self) -> Vec<ZoneStatus> {
        self.zones.iter().map(Zone::status).collect()
    }

    fn increment(&mut self, section: usize) {
        self.zones[section].object_count += 1;
    }

    fn decrement(&mut self, section: usize) {
        let zone = &mut self.zones[section];
        debug_assert!(zone.object_count > 0, "zone {section} decremented below zero");
        zone.object_count = zone.object_count.saturating_sub(1);
    }

    /// Move every live part to the section under its centroid and record
    /// per-zone presence for the cleanup rule.
    pub fn update_objects(&mut self, detections: &[TrackedDetection], frame_width: f32) {
        let count = self.zones.len();
        let mut present = vec![false; count];

        for det in detections {
            let (cx, _) = det.bbox.center();
            let section = section_of(cx, frame_width, count);
            present[section] = true;

            match self.object_sections.insert(det.track_id, section) {
                None => {
                    self.increment(section);
                    trace!(track_id = det.track_id, zone = section, "object entered zone");
                }
                Some(previous) if previous != section => {
                    self.decrement(previous);
                    self.increment(section);
                    trace!(track_id = det.track_id, from = previous, to = section, "object changed zone");
                }
                Some(_) => {}
            }
        }

        for (zone, present) in self.zones.iter_mut().zip(present) {
            zone.vacancy.record(present);
        }
        self.debug_check_counts();
    }

    /// Rebuild sticker counts from this frame's stickers. Returns persistent
    /// sticker ids when association is enabled.
    pub fn update_stickers(
        &mut self,
        stickers: &[StickerObservation],
        frame_width: f32,
    ) -> Option<Vec<u64>> {
        let count = self.zones.len();
        for zone in self.zones.iter_mut() {
            zone.sticker_count = 0;
        }
        let placed: Vec<((f32, f32), usize)> = stickers
            .iter()
            .map(|s| {
                let center = s.bbox.center();
                (center, section_of(center.0, frame_width, count))
            })
            .collect();
        for &(_, section) in &placed {
            self.zones[section].sticker_count += 1;
        }
        self.associator.as_mut().map(|assoc| assoc.update(&placed))
    }

    /// Zero every zone whose absence counter has expired, discarding the
    /// tracks still attributed to it. Safe to run from several call sites:
    /// a zone that is already empty is left untouched.
    pub fn cleanup(&mut self, trigger: CleanupTrigger, frame_index: u64) -> Vec<ZoneCleanup> {
        if !trigger.fires_at(frame_index) {
            return Vec::new();
        }
        let mut cleared = Vec::new();
        for zone in self.zones.iter_mut() {
            if !zone.vacancy.is_expired() {
                continue;
            }
            let mut purged: Vec<u64> = self
                .object_sections
                .iter()
                .filter_map(|(&id, &section)| (section == zone.index).then_some(id))
                .collect();
            if zone.object_count == 0 && purged.is_empty() {
                continue;
            }
            purged.sort_unstable();
            for id in &purged {
                self.object_sections.remove(id);
            }
            info!(
                zone = zone.index,
                count = zone.object_count,
                empty_frames = zone.vacancy.empty_frames(),
                ?trigger,
                "zone cleared after sustained absence"
            );
            zone.object_count = 0;
            cleared.push(ZoneCleanup {
                zone: zone.index,
                purged,
            });
        }
        self.debug_check_counts();
        cleared
    }

    /// Drop a track, releasing the zone count it holds.
    pub fn forget_track(&mut self, track_id: u64) -> bool {
        match self.object_sections.remove(&track_id) {
            Some(section) => {
                self.decrement(section);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        for zone in self.zones.iter_mut() {
            zone.object_count = 0;
            zone.sticker_count = 0;
            zone.vacancy.reset();
        }
        self.object_sections.clear();
        if let Some(assoc) = self.associator.as_mut() {
            assoc.clear();
        }
    }

    fn debug_check_counts(&self) {
        debug_assert_eq!(
            self.zones.iter().map(|z| z.object_count as usize).sum::<usize>(),
            self.object_sections.len(),
            "zone counts out of sync with attributed tracks"
        );
    }
}
