//! Builder for detections coming from heterogeneous detector outputs.

use crate::tracker::{Rect, Side, StickerObservation, TrackedDetection};

/// Builder for [`TrackedDetection`] and [`StickerObservation`] values.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    track_id: u64,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    class_id: u32,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_id(mut self, track_id: u64) -> Self {
        self.track_id = track_id;
        self
    }

    /// Bounding box as corners (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Bounding box as center and size.
    pub fn xywh(self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.tlbr(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    /// Bounding box as top-left corner and size.
    pub fn tlwh(self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.tlbr(x, y, x + w, y + h)
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn class_id(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    fn rect(&self) -> Rect {
        Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2)
    }

    pub fn build(self) -> TrackedDetection {
        TrackedDetection {
            class_id: self.class_id,
            ..TrackedDetection::from_rect(self.track_id, self.rect(), self.score)
        }
    }

    /// Build a sticker observation; the track id and class are ignored.
    pub fn build_sticker(self, side: Side) -> StickerObservation {
        StickerObservation {
            bbox: self.rect(),
            side,
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_builder() {
        let det = DetectionBuilder::new()
            .track_id(3)
            .xywh(30.0, 50.0, 40.0, 60.0)
            .score(0.95)
            .class_id(1)
            .build();

        assert_eq!(det.track_id, 3);
        assert_eq!(det.class_id, 1);
        assert_eq!(det.bbox.to_tlbr(), [10.0, 20.0, 50.0, 80.0]);
    }

    #[test]
    fn test_sticker_builder() {
        let sticker = DetectionBuilder::new()
            .tlwh(10.0, 20.0, 5.0, 5.0)
            .score(0.8)
            .build_sticker(Side::Left);
        assert_eq!(sticker.side, Side::Left);
        assert_eq!(sticker.bbox.center(), (12.5, 22.5));
    }
}
