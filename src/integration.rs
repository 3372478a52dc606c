//! Integration layer connecting the engine to frame sources, detectors and
//! session record storage.

mod builder;
mod detector;
mod session;
mod sink;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, FrameSource, IntoDetections, NoStickers, StickerSource};
pub use session::{CancelHandle, InspectionSession, SessionOutcome, StopReason};
pub use sink::{JsonLinesSink, SessionSink};
