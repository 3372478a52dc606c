//! Checks that stickers found on a labelled part agree with its side.

use std::collections::{HashMap, HashSet};

use tracing::{info, trace};

use crate::config::StickerConfig;
use crate::tracker::detection::{Side, StickerObservation};
use crate::tracker::events::{StickerErrorKind, WarningEvent};
use crate::tracker::rect::Rect;

/// A visible part with a side label, as seen by the validator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelledPart {
    pub track_id: u64,
    pub bbox: Rect,
    pub side: Side,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Debounce {
    kind: StickerErrorKind,
    frames: u32,
    confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct StickerPlacementValidator {
    required_frames: u32,
    display_secs: f64,
    entries: HashMap<u64, Debounce>,
    active: Option<WarningEvent>,
}

impl StickerPlacementValidator {
    pub fn new(config: &StickerConfig) -> Self {
        Self {
            required_frames: config.required_frames.max(1),
            display_secs: config.warning_display_secs,
            entries: HashMap::new(),
            active: None,
        }
    }

    /// First contradicting sticker whose centroid lies on the part.
    fn contradiction(part: &LabelledPart, stickers: &[StickerObservation]) -> Option<StickerErrorKind> {
        stickers
            .iter()
            .filter(|s| {
                let (cx, cy) = s.bbox.center();
                part.bbox.contains_point(cx, cy)
            })
            .find_map(|s| StickerErrorKind::classify(part.side, s.side))
    }

    /// Feed one frame. Returns the warnings confirmed during this frame.
    ///
    /// Counts only run across consecutive frames: a track missing from
    /// `parts` loses its pending count.
    pub fn update(
        &mut self,
        now: f64,
        parts: &[LabelledPart],
        stickers: &[StickerObservation],
    ) -> Vec<WarningEvent> {
        let seen: HashSet<u64> = parts.iter().map(|p| p.track_id).collect();
        self.entries.retain(|id, _| seen.contains(id));

        let mut confirmed = Vec::new();
        for part in parts {
            let Some(kind) = Self::contradiction(part, stickers) else {
                if self.entries.remove(&part.track_id).is_some() {
                    trace!(track_id = part.track_id, "sticker check satisfied, debounce cleared");
                }
                continue;
            };

            let entry = self
                .entries
                .entry(part.track_id)
                .and_modify(|e| {
                    if e.kind == kind {
                        e.frames = e.frames.saturating_add(1);
                    } else {
                        *e = Debounce {
                            kind,
                            frames: 1,
                            confirmed: false,
                        };
                    }
                })
                .or_insert(Debounce {
                    kind,
                    frames: 1,
                    confirmed: false,
                });

            if !entry.confirmed && entry.frames >= self.required_frames {
                entry.confirmed = true;
                let event = WarningEvent::sticker(part.track_id, kind, now);
                info!(track_id = part.track_id, ?kind, "{}", kind.message());
                self.active = Some(event);
                confirmed.push(event);
            }
        }
        confirmed
    }

    /// Last confirmed warning, while it is still inside its display window.
    pub fn active_warning(&self, now: f64) -> Option<WarningEvent> {
        self.active.filter(|w| now - w.timestamp < self.display_secs)
    }

    /// Consecutive contradicting frames recorded for a track.
    pub fn pending_frames(&self, track_id: u64) -> u32 {
        self.entries.get(&track_id).map_or(0, |e| e.frames)
    }

    pub fn forget(&mut self, track_id: u64) {
        self.entries.remove(&track_id);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.active = None;
    }
}
