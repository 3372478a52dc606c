//! Engine configuration.
//!
//! Every section has defaults matching the production line setup, so a
//! config file only needs to list the values it changes:
//!
//! ```json
//! {
//!   "slots": { "right": { "x": 50, "y": 200, "width": 180, "height": 180 } },
//!   "zones": { "count": 4 },
//!   "templates": { "right": "resources/base_images/right-base-image.png" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracker::{DEFAULT_WORKING_SIZE_PX, Rect};

/// Fixed placement rectangles where parts are put down for testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub right: Rect,
    pub left: Rect,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            right: Rect::from_tlbr(50.0, 200.0, 230.0, 380.0),
            left: Rect::from_tlbr(350.0, 200.0, 530.0, 380.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Number of past boxes that must agree before a part counts as still
    pub history_len: usize,
    /// Maximum per-coordinate movement, in pixels
    pub movement_threshold_px: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            history_len: 5,
            movement_threshold_px: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Minimum time a part must sit in a slot before sampling starts
    pub min_dwell_secs: f64,
    pub test_duration_secs: f64,
    pub sample_interval_secs: f64,
    /// Similarity a template must exceed to count as a confident match
    pub warning_threshold: f32,
    /// Consecutive frames without a detection before a slot is empty
    pub slot_empty_frames: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_dwell_secs: 0.0,
            test_duration_secs: 0.2,
            sample_interval_secs: 0.1,
            warning_threshold: 0.8,
            slot_empty_frames: 1,
        }
    }
}

impl PlacementConfig {
    /// Orientation samples needed before a slot may settle.
    pub fn required_samples(&self) -> usize {
        ((self.test_duration_secs / self.sample_interval_secs).round() as usize).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Number of equal vertical sections
    pub count: usize,
    /// Consecutive empty frames before a zone is forcibly cleared
    pub empty_frame_threshold: u32,
    /// Period of the bulk cleanup sweep, in frames
    pub sweep_interval_frames: u64,
    /// Frames a track may go undetected before it is forgotten
    pub track_timeout_frames: u64,
    /// Give stickers persistent ids by nearest-centroid assignment
    pub associate_stickers: bool,
    pub sticker_match_distance_px: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            count: 3,
            empty_frame_threshold: 90,
            sweep_interval_frames: 30,
            track_timeout_frames: 60,
            associate_stickers: false,
            sticker_match_distance_px: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerConfig {
    /// Consecutive contradicting frames before a sticker warning is confirmed
    pub required_frames: u32,
    /// How long a confirmed warning stays on screen
    pub warning_display_secs: f64,
    /// Overlap above which a left and a right sticker are the same sticker
    pub conflict_iou: f32,
}

impl Default for StickerConfig {
    fn default() -> Self {
        Self {
            required_frames: 10,
            warning_display_secs: 1.0,
            conflict_iou: 0.5,
        }
    }
}

/// Reference image locations. Missing entries disable or degrade scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub right: Option<PathBuf>,
    pub left: Option<PathBuf>,
    /// Longest side, in pixels, that crops and templates are reduced to before matching
    pub working_size_px: u32,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            right: None,
            left: None,
            working_size_px: DEFAULT_WORKING_SIZE_PX,
        }
    }
}

/// Complete configuration of an [`InspectionEngine`](crate::InspectionEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub slots: SlotConfig,
    /// Object detections below this confidence are ignored everywhere
    pub detection_confidence: f32,
    pub sticker_confidence: f32,
    pub stability: StabilityConfig,
    pub placement: PlacementConfig,
    pub zones: ZoneConfig,
    pub stickers: StickerConfig,
    pub templates: TemplateConfig,
    /// Detector identifier reported with the session summary
    pub model_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slots: SlotConfig::default(),
            detection_confidence: 0.5,
            sticker_confidence: 0.7,
            stability: StabilityConfig::default(),
            placement: PlacementConfig::default(),
            zones: ZoneConfig::default(),
            stickers: StickerConfig::default(),
            templates: TemplateConfig::default(),
            model_name: "YOLOv8".to_string(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_unit(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} is outside [0, 1]")))
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, slot) in [("slots.right", &self.slots.right), ("slots.left", &self.slots.left)] {
            if slot.width <= 0.0 || slot.height <= 0.0 {
                return Err(invalid(field, "slot rectangle has no area"));
            }
        }
        check_unit("detection_confidence", self.detection_confidence)?;
        check_unit("sticker_confidence", self.sticker_confidence)?;
        check_unit("placement.warning_threshold", self.placement.warning_threshold)?;
        check_unit("stickers.conflict_iou", self.stickers.conflict_iou)?;
        if self.stability.history_len == 0 {
            return Err(invalid("stability.history_len", "must be at least 1"));
        }
        if self.placement.sample_interval_secs <= 0.0 {
            return Err(invalid("placement.sample_interval_secs", "must be positive"));
        }
        if self.placement.min_dwell_secs < 0.0 {
            return Err(invalid("placement.min_dwell_secs", "must not be negative"));
        }
        if self.zones.count == 0 {
            return Err(invalid("zones.count", "must be at least 1"));
        }
        if self.zones.sweep_interval_frames == 0 {
            return Err(invalid("zones.sweep_interval_frames", "must be at least 1"));
        }
        if self.templates.working_size_px < 16 {
            return Err(invalid("templates.working_size_px", "must be at least 16"));
        }
        if self.stickers.required_frames == 0 {
            return Err(invalid("stickers.required_frames", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.placement.required_samples(), 2);
        assert_eq!(config.slots.right.to_tlbr(), [50.0, 200.0, 230.0, 380.0]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "zones": { "count": 4 }, "stickers": { "required_frames": 12 } }"#,
        )
        .unwrap();
        assert_eq!(config.zones.count, 4);
        assert_eq!(config.zones.empty_frame_threshold, 90);
        assert_eq!(config.stickers.required_frames, 12);
        assert_eq!(config.stability.history_len, 5);
        assert!(config.templates.right.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = EngineConfig::from_json_str(r#"{ "zones": { "count": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "zones.count", .. }));

        let err = EngineConfig::from_json_str(r#"{ "zones": { "sweep_interval_frames": 0 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "zones.sweep_interval_frames", .. }
        ));

        let err = EngineConfig::from_json_str(r#"{ "templates": { "working_size_px": 4 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "templates.working_size_px", .. }));

        let err = EngineConfig::from_json_str(r#"{ "detection_confidence": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "detection_confidence", .. }));

        assert!(matches!(
            EngineConfig::from_json_str("{ not json").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "model_name": "right_part_medium" }"#).unwrap();
        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.model_name, "right_part_medium");

        let missing = EngineConfig::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
