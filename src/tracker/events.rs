//! Frame-level outputs for the display and alerting layer.

use serde::Serialize;

use crate::tracker::detection::Side;
use crate::tracker::placement::{PlacementBoxState, PlacementOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    OrientationMismatch,
    SideCrossing,
    StickerMismatch,
}

/// Which sticker contradicted which part label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StickerErrorKind {
    /// Left sticker found on a part labelled right
    LeftOnRight,
    /// Right sticker found on a part labelled left
    RightOnLeft,
}

impl StickerErrorKind {
    /// Error kind for a sticker of `sticker` side on a part labelled `part`,
    /// or `None` when they agree.
    pub fn classify(part: Side, sticker: Side) -> Option<Self> {
        match (part, sticker) {
            (Side::Right, Side::Left) => Some(Self::LeftOnRight),
            (Side::Left, Side::Right) => Some(Self::RightOnLeft),
            _ => None,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::LeftOnRight => "Left sticker on right part",
            Self::RightOnLeft => "Right sticker on left part",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WarningEvent {
    pub kind: WarningKind,
    pub track_id: u64,
    /// Tick timestamp, seconds
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_error: Option<StickerErrorKind>,
}

impl WarningEvent {
    pub fn new(kind: WarningKind, track_id: u64, timestamp: f64) -> Self {
        Self {
            kind,
            track_id,
            timestamp,
            sticker_error: None,
        }
    }

    pub fn sticker(track_id: u64, error: StickerErrorKind, timestamp: f64) -> Self {
        Self {
            sticker_error: Some(error),
            ..Self::new(WarningKind::StickerMismatch, track_id, timestamp)
        }
    }
}

/// Occupancy of one vertical zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneStatus {
    pub index: usize,
    pub object_count: u32,
    pub sticker_count: u32,
    /// Parts and stickers reconcile
    #[serde(rename = "match")]
    pub matched: bool,
}

/// Side label of a track visible in this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackLabel {
    pub track_id: u64,
    pub side: Option<Side>,
}

/// Everything the engine produced for one tick.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub timestamp: f64,
    /// Warnings raised during this tick
    pub warnings: Vec<WarningEvent>,
    pub placements: Vec<PlacementOutcome>,
    pub zones: Vec<ZoneStatus>,
    pub slots: [PlacementBoxState; 2],
    /// Confirmed sticker warning still inside its display window
    pub active_sticker_warning: Option<WarningEvent>,
    pub labels: Vec<TrackLabel>,
    /// Persistent ids of the accepted stickers, in detection order. Only
    /// present when sticker association is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_ids: Option<Vec<u64>>,
}

impl FrameReport {
    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &WarningEvent> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}
