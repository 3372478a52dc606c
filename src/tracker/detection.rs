//! Per-frame inputs consumed from the detector collaborators.

use crate::tracker::rect::Rect;

/// Left/right orientation of a part or a sticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Right => Side::Left,
            Side::Left => Side::Right,
        }
    }

    /// Numeric label drawn next to a part: `1` for right, `2` for left.
    pub fn label(self) -> u8 {
        match self {
            Side::Right => 1,
            Side::Left => 2,
        }
    }
}

/// Numeric label of an optional side assignment, `0` when unassigned.
pub fn side_label(side: Option<Side>) -> u8 {
    side.map_or(0, Side::label)
}

/// One tracked object reported by the detector/tracker for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedDetection {
    /// Persistent identity assigned by the tracker
    pub track_id: u64,
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
    /// Detector class index
    pub class_id: u32,
}

impl TrackedDetection {
    pub fn new(track_id: u64, x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class_id: u32) -> Self {
        Self {
            track_id,
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
            class_id,
        }
    }

    pub fn from_rect(track_id: u64, bbox: Rect, score: f32) -> Self {
        Self {
            track_id,
            bbox,
            score,
            class_id: 0,
        }
    }
}

/// A sticker seen in the current frame. Stickers carry no identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickerObservation {
    pub bbox: Rect,
    /// Which orientation the sticker marks
    pub side: Side,
    pub score: f32,
}

impl StickerObservation {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, side: Side, score: f32) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            side,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_labels() {
        assert_eq!(side_label(None), 0);
        assert_eq!(side_label(Some(Side::Right)), 1);
        assert_eq!(side_label(Some(Side::Left)), 2);
        assert_eq!(Side::Right.opposite(), Side::Left);
    }
}
