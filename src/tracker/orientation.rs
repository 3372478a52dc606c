//! Left/right orientation scoring against reference templates.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::TemplateError;
use crate::tracker::detection::Side;
use crate::tracker::raster::{Frame, GrayImage, alignment_score};
use crate::tracker::rect::Rect;

/// Angular step of the rotation sweep, in degrees.
pub const ROTATION_STEP_DEG: usize = 15;

/// Default longest side, in pixels, at which crops and templates are matched.
pub const DEFAULT_WORKING_SIZE_PX: u32 = 96;

/// Downscale factor that brings the larger of two rasters down to
/// `working_size` pixels on its longest side. Never upscales.
pub fn working_scale(a: &GrayImage, b: &GrayImage, working_size: u32) -> f32 {
    let (ar, ac) = a.dim();
    let (br, bc) = b.dim();
    let longest = ar.max(ac).max(br).max(bc);
    if longest == 0 || longest <= working_size as usize {
        1.0
    } else {
        working_size as f32 / longest as f32
    }
}

/// Best correlation of a crop against the right- and left-oriented templates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OrientationScores {
    pub right: f32,
    pub left: f32,
}

impl OrientationScores {
    pub fn new(right: f32, left: f32) -> Self {
        Self { right, left }
    }

    pub fn best(&self) -> f32 {
        self.right.max(self.left)
    }

    /// Side whose template matched better. Ties go to `slot`.
    pub fn preferred_side(&self, slot: Side) -> Side {
        if self.right > self.left {
            Side::Right
        } else if self.left > self.right {
            Side::Left
        } else {
            slot
        }
    }

    /// A part in `slot` is misplaced when the opposite template wins and
    /// clears `threshold`.
    pub fn is_mismatch(&self, slot: Side, threshold: f32) -> bool {
        match slot {
            Side::Right => self.left > self.right && self.left > threshold,
            Side::Left => self.right > self.left && self.right > threshold,
        }
    }
}

/// Scores the content of a placement slot.
///
/// Returns `None` when scoring is unavailable, for example because no
/// reference template could be loaded.
pub trait OrientationScorer {
    fn score(&mut self, frame: &Frame, slot: Side, region: &Rect) -> Option<OrientationScores>;
}

/// Right- and left-oriented templates used for one slot.
#[derive(Debug, Clone)]
struct TemplatePair {
    right: GrayImage,
    left: GrayImage,
}

/// Reference templates for both slots.
///
/// Each slot compares against its own reference image and that image's
/// horizontal mirror. A missing reference is replaced by the mirror of the
/// other one.
#[derive(Debug, Clone)]
pub struct ReferenceTemplates {
    right_slot: TemplatePair,
    left_slot: TemplatePair,
}

impl ReferenceTemplates {
    pub fn from_images(right_base: Option<GrayImage>, left_base: Option<GrayImage>) -> Option<Self> {
        let right_base = right_base.filter(|t| !t.is_empty());
        let left_base = left_base.filter(|t| !t.is_empty());
        let right = right_base
            .clone()
            .or_else(|| left_base.as_ref().map(GrayImage::flip_horizontal))?;
        let left = left_base.or_else(|| right_base.as_ref().map(GrayImage::flip_horizontal))?;

        Some(Self {
            right_slot: TemplatePair {
                left: right.flip_horizontal(),
                right,
            },
            left_slot: TemplatePair {
                right: left.flip_horizontal(),
                left,
            },
        })
    }

    /// Load whichever reference images are configured. `Ok(None)` means no
    /// path was given at all.
    pub fn load(right: Option<&Path>, left: Option<&Path>) -> Result<Option<Self>, TemplateError> {
        let right = right.map(GrayImage::load).transpose()?;
        let left = left.map(GrayImage::load).transpose()?;
        Ok(Self::from_images(right, left))
    }

    fn pair(&self, slot: Side) -> &TemplatePair {
        match slot {
            Side::Right => &self.right_slot,
            Side::Left => &self.left_slot,
        }
    }
}

/// Multi-angle normalized cross-correlation scorer.
#[derive(Debug, Clone)]
pub struct TemplateScorer {
    templates: Option<ReferenceTemplates>,
    angles: Vec<f32>,
    working_size: u32,
}

impl TemplateScorer {
    pub fn new(templates: Option<ReferenceTemplates>) -> Self {
        Self {
            templates,
            angles: (0..360)
                .step_by(ROTATION_STEP_DEG)
                .map(|a| a as f32)
                .collect(),
            working_size: DEFAULT_WORKING_SIZE_PX,
        }
    }

    /// Match at most `px` pixels on the longest side of crop or template.
    pub fn with_working_size(mut self, px: u32) -> Self {
        self.working_size = px.max(1);
        self
    }

    /// Scorer with scoring disabled; every call reports "unavailable".
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Load templates from disk, degrading to a disabled scorer on failure.
    pub fn from_paths(right: Option<&Path>, left: Option<&Path>) -> Self {
        match ReferenceTemplates::load(right, left) {
            Ok(Some(templates)) => Self::new(Some(templates)),
            Ok(None) => {
                warn!("no reference templates configured, orientation scoring disabled");
                Self::disabled()
            }
            Err(err) => {
                warn!(error = %err, "reference templates unavailable, orientation scoring disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.templates.is_some()
    }

    /// Best correlation of `template` against `crop` over the rotation sweep.
    ///
    /// Both rasters are first downscaled by a common factor so the larger one
    /// fits the working size.
    pub fn best_rotation_score(&self, crop: &GrayImage, template: &GrayImage) -> f32 {
        let factor = working_scale(crop, template, self.working_size);
        let crop = crop.scaled(factor);
        let template = template.scaled(factor);
        self.angles
            .iter()
            .filter_map(|&angle| alignment_score(&crop, &template.rotate(angle)))
            .fold(-1.0, f32::max)
    }

    pub fn score_crop(&self, crop: &GrayImage, slot: Side) -> Option<OrientationScores> {
        let pair = self.templates.as_ref()?.pair(slot);
        Some(OrientationScores::new(
            self.best_rotation_score(crop, &pair.right),
            self.best_rotation_score(crop, &pair.left),
        ))
    }
}

impl OrientationScorer for TemplateScorer {
    fn score(&mut self, frame: &Frame, slot: Side, region: &Rect) -> Option<OrientationScores> {
        if !self.is_enabled() {
            return None;
        }
        let crop = GrayImage::from_frame(&frame.crop(region)?);
        let scores = self.score_crop(&crop, slot)?;
        debug!(?slot, right_score = scores.right, left_score = scores.left, "orientation scored");
        Some(scores)
    }
}
