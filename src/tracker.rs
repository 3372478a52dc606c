mod detection;
mod engine;
mod events;
mod hysteresis;
mod matching;
mod orientation;
mod placement;
mod raster;
mod rect;
mod side_crossing;
mod stability;
mod stats;
mod sticker_validator;
mod track;
mod track_state;
mod zones;

pub use detection::{Side, StickerObservation, TrackedDetection, side_label};
pub use engine::InspectionEngine;
pub use events::{FrameReport, StickerErrorKind, TrackLabel, WarningEvent, WarningKind, ZoneStatus};
pub use hysteresis::{AbsenceHysteresis, CleanupTrigger};
pub use matching::{AssignmentResult, StickerAssociator, linear_assignment, resolve_sticker_conflicts};
pub use orientation::{
    DEFAULT_WORKING_SIZE_PX, OrientationScorer, OrientationScores, ROTATION_STEP_DEG,
    ReferenceTemplates, TemplateScorer, working_scale,
};
pub use placement::{PlacementBoxState, PlacementOutcome, PlacementStateMachine, SlotColor, SlotState};
pub use raster::{Frame, GrayImage, alignment_score, capture_reference, match_template};
pub use rect::{Rect, iou_batch};
pub use side_crossing::SideCrossingMonitor;
pub use stability::{BoxHistory, StabilityGate};
pub use stats::{SessionStats, SessionSummary};
pub use sticker_validator::{LabelledPart, StickerPlacementValidator};
pub use track::{Track, TrackRegistry};
pub use track_state::TrackPhase;
pub use zones::{Zone, ZoneCleanup, ZoneOccupancyTracker, section_of};
