//! Traits connecting the engine to its external collaborators.

use crate::tracker::{Frame, StickerObservation, TrackedDetection};

/// Camera or video reader.
pub trait FrameSource {
    type Error;

    /// Next frame, or `Ok(None)` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;
}

/// Object detector combined with a multi-object tracker.
///
/// Implementations return every box they see with its persistent track id;
/// confidence filtering happens in the engine.
///
/// # Example
///
/// ```ignore
/// use placecheck_rs::integration::DetectionSource;
/// use placecheck_rs::tracker::{Frame, TrackedDetection};
///
/// struct MyTracker;
///
/// impl DetectionSource for MyTracker {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<TrackedDetection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<TrackedDetection>, Self::Error>;
}

/// Sticker detector. Left and right detections are returned in one list,
/// tagged with their side.
pub trait StickerSource {
    type Error;

    fn detect_stickers(&mut self, frame: &Frame) -> Result<Vec<StickerObservation>, Self::Error>;
}

/// Sticker source for lines that run without sticker detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStickers;

impl StickerSource for NoStickers {
    type Error = std::convert::Infallible;

    fn detect_stickers(&mut self, _frame: &Frame) -> Result<Vec<StickerObservation>, Self::Error> {
        Ok(Vec::new())
    }
}

/// Conversion from a model-specific output into tracked detections.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<TrackedDetection>;
}

impl IntoDetections for Vec<TrackedDetection> {
    fn into_detections(self) -> Vec<TrackedDetection> {
        self
    }
}

/// `(track_id, [x1, y1, x2, y2], confidence, class)` rows, as most trackers
/// emit them.
impl IntoDetections for Vec<(u64, [f32; 4], f32, u32)> {
    fn into_detections(self) -> Vec<TrackedDetection> {
        self.into_iter()
            .map(|(id, [x1, y1, x2, y2], score, class)| TrackedDetection::new(id, x1, y1, x2, y2, score, class))
            .collect()
    }
}
