//! Placement verification and zone occupancy tracking for parts moving on a
//! conveyor.
//!
//! The [`InspectionEngine`] consumes per-frame tracker output (part boxes
//! with persistent ids) and sticker detections. It decides each part's
//! left/right orientation once the part rests in a placement slot, flags
//! parts that drift to the wrong half of the belt, and keeps per-zone part
//! and sticker counts reconciled.
//!
//! ```ignore
//! use placecheck_rs::{EngineConfig, InspectionEngine};
//!
//! let config = EngineConfig::from_json_file("engine.json")?;
//! let mut engine = InspectionEngine::from_config(config)?;
//! let report = engine.process_frame(&frame, &detections, &stickers);
//! for warning in &report.warnings {
//!     println!("{:?} on track {}", warning.kind, warning.track_id);
//! }
//! ```

pub mod config;
pub mod error;
pub mod integration;
pub mod tracker;

pub use config::EngineConfig;
pub use error::{ConfigError, SessionError, TemplateError};
pub use integration::{DetectionBuilder, DetectionSource, FrameSource, InspectionSession, StickerSource};
pub use tracker::{
    FrameReport, InspectionEngine, Rect, SessionSummary, Side, StickerObservation, TrackedDetection,
    WarningEvent, WarningKind,
};
