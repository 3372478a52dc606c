//! Raster types and the template-matching primitive used for orientation checks.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{self, MatchTemplateMethod};
use nalgebra::{Matrix3, Rotation2, Translation2, Vector2};
use ndarray::{Array3, ArrayView2, ArrayView3, s};

use crate::error::TemplateError;
use crate::tracker::rect::Rect;

/// One acquired camera frame.
///
/// Pixels are stored as `(rows, cols, channels)` with either one (gray) or
/// three (RGB) channels.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: Array3<u8>,
    /// Acquisition time in seconds
    pub timestamp: f64,
}

impl Frame {
    pub fn new(pixels: Array3<u8>, timestamp: f64) -> Self {
        Self { pixels, timestamp }
    }

    /// Black single-channel frame, for callers that only need geometry.
    pub fn blank(width: usize, height: usize, timestamp: f64) -> Self {
        Self::new(Array3::zeros((height, width, 1)), timestamp)
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    /// Copy of the region covered by `region`, clipped to the frame.
    pub fn crop(&self, region: &Rect) -> Option<Frame> {
        let (x1, y1, x2, y2) = region.clip_to(self.width(), self.height())?;
        let pixels = self.pixels.slice(s![y1..y2, x1..x2, ..]).to_owned();
        Some(Frame::new(pixels, self.timestamp))
    }

    /// Write the frame as an image file; the format follows the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let path = path.as_ref();
        let (height, width, channels) = self.pixels.dim();
        let raw: Vec<u8> = self.pixels.iter().copied().collect();
        let color = if channels == 1 {
            image::ExtendedColorType::L8
        } else {
            image::ExtendedColorType::Rgb8
        };
        image::save_buffer(path, &raw, width as u32, height as u32, color).map_err(|source| {
            TemplateError::Image {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// Crop a slot, grown by `margin` pixels and clipped to the frame, for use as a
/// new reference image.
pub fn capture_reference(frame: &Frame, slot: &Rect, margin: f32) -> Option<Frame> {
    frame.crop(&slot.expand(margin))
}

/// Single-channel 8-bit raster.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    buf: image::GrayImage,
}

/// Integral table as produced by `imageproc`, one row/col of padding.
type SumTable = ImageBuffer<Luma<u64>, Vec<u64>>;

/// BT.601 luma, rounded like OpenCV's `cvtColor`.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

impl GrayImage {
    pub fn new(buf: image::GrayImage) -> Self {
        Self { buf }
    }

    /// Build from a `(rows, cols)` array.
    pub fn from_array(data: ArrayView2<'_, u8>) -> Self {
        let (height, width) = data.dim();
        Self::new(image::GrayImage::from_fn(width as u32, height as u32, |x, y| {
            Luma([data[[y as usize, x as usize]]])
        }))
    }

    /// Convert interleaved pixels to luminance.
    pub fn from_pixels(pixels: ArrayView3<'_, u8>) -> Self {
        let (height, width, channels) = pixels.dim();
        Self::new(image::GrayImage::from_fn(width as u32, height as u32, |x, y| {
            let (r, c) = (y as usize, x as usize);
            match channels {
                0 => Luma([0]),
                1 | 2 => Luma([pixels[[r, c, 0]]]),
                _ => Luma([luma(pixels[[r, c, 0]], pixels[[r, c, 1]], pixels[[r, c, 2]])]),
            }
        }))
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_pixels(frame.pixels())
    }

    /// Decode an image file and convert it to gray.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let rgb = image::open(path)
            .map_err(|source| TemplateError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(TemplateError::Empty(path.to_path_buf()));
        }
        Ok(Self::new(image::GrayImage::from_fn(width, height, |x, y| {
            let p = rgb.get_pixel(x, y);
            Luma([luma(p[0], p[1], p[2])])
        })))
    }

    /// `(rows, cols)`
    pub fn dim(&self) -> (usize, usize) {
        (self.buf.height() as usize, self.buf.width() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.width() == 0 || self.buf.height() == 0
    }

    pub fn pixel(&self, row: usize, col: usize) -> u8 {
        self.buf.get_pixel(col as u32, row as u32)[0]
    }

    pub fn as_image(&self) -> &image::GrayImage {
        &self.buf
    }

    /// Mirror left to right.
    pub fn flip_horizontal(&self) -> GrayImage {
        Self::new(imageops::flip_horizontal(&self.buf))
    }

    /// Rotate counter-clockwise by `angle_deg` about the integer image
    /// center, keeping the original size. Uncovered pixels become black.
    pub fn rotate(&self, angle_deg: f32) -> GrayImage {
        if self.is_empty() || angle_deg.rem_euclid(360.0) == 0.0 {
            return self.clone();
        }
        let (height, width) = self.dim();
        let center = Vector2::new((width / 2) as f32, (height / 2) as f32);
        // Image rows grow downwards, so a negative angle turns counter-clockwise on screen.
        let forward: Matrix3<f32> = Translation2::from(center).to_homogeneous()
            * Rotation2::new(-angle_deg.to_radians()).to_homogeneous()
            * Translation2::from(-center).to_homogeneous();
        let row_major: [f32; 9] = std::array::from_fn(|i| forward[(i / 3, i % 3)]);
        let Some(projection) = Projection::from_matrix(row_major) else {
            return self.clone();
        };
        Self::new(warp(&self.buf, &projection, Interpolation::Bilinear, Luma([0])))
    }

    /// Downsample by `factor` (< 1). Larger factors return a copy.
    pub fn scaled(&self, factor: f32) -> GrayImage {
        if factor >= 1.0 || self.is_empty() {
            return self.clone();
        }
        let width = ((self.buf.width() as f32 * factor).round() as u32).max(1);
        let height = ((self.buf.height() as f32 * factor).round() as u32).max(1);
        Self::new(imageops::resize(&self.buf, width, height, FilterType::Triangle))
    }

    fn center_crop(&self, rows: usize, cols: usize) -> GrayImage {
        let (height, width) = self.dim();
        let rows = rows.min(height);
        let cols = cols.min(width);
        let top = (height - rows) / 2;
        let left = (width - cols) / 2;
        Self::new(
            imageops::crop_imm(&self.buf, left as u32, top as u32, cols as u32, rows as u32)
                .to_image(),
        )
    }
}

#[inline]
fn window_sum(table: &SumTable, x: u32, y: u32, cols: u32, rows: u32) -> f64 {
    let at = |x: u32, y: u32| table.get_pixel(x, y)[0] as f64;
    at(x + cols, y + rows) - at(x, y + rows) - at(x + cols, y) + at(x, y)
}

/// Maximum zero-mean normalized cross-correlation of `template` slid over
/// every position of `image` (OpenCV's `TM_CCOEFF_NORMED`).
///
/// The raw correlation surface comes from `imageproc`; window means and
/// energies come from its integral images.
///
/// Returns `None` when the template is empty or does not fit in the image.
pub fn match_template(image: &GrayImage, template: &GrayImage) -> Option<f32> {
    let (ih, iw) = image.dim();
    let (th, tw) = template.dim();
    if th == 0 || tw == 0 || th > ih || tw > iw {
        return None;
    }

    let n = (th * tw) as f64;
    let (t_sum, t_sq) = template.buf.pixels().fold((0.0f64, 0.0f64), |(s, q), p| {
        let v = p[0] as f64;
        (s + v, q + v * v)
    });
    let t_energy = (t_sq - t_sum * t_sum / n).max(0.0);

    let correlation = template_matching::match_template(
        &image.buf,
        &template.buf,
        MatchTemplateMethod::CrossCorrelation,
    );
    let sums: SumTable = integral_image::<_, u64>(&image.buf);
    let squares: SumTable = integral_squared_image::<_, u64>(&image.buf);

    let mut best = f64::NEG_INFINITY;
    for (x, y, raw) in correlation.enumerate_pixels() {
        let s1 = window_sum(&sums, x, y, tw as u32, th as u32);
        let s2 = window_sum(&squares, x, y, tw as u32, th as u32);
        let variance = (s2 - s1 * s1 / n).max(0.0);
        let denom = (t_energy * variance).sqrt();
        let score = if denom > 1e-9 {
            (raw[0] as f64 - s1 * t_sum / n) / denom
        } else {
            0.0
        };
        best = best.max(score);
    }
    Some(best.clamp(-1.0, 1.0) as f32)
}

/// Best alignment score between two rasters of arbitrary size.
///
/// The smaller raster is slid over the larger one. When neither contains the
/// other, the second is center-cropped to fit inside the first.
pub fn alignment_score(image: &GrayImage, template: &GrayImage) -> Option<f32> {
    let (ih, iw) = image.dim();
    let (th, tw) = template.dim();
    if th <= ih && tw <= iw {
        match_template(image, template)
    } else if ih <= th && iw <= tw {
        match_template(template, image)
    } else {
        match_template(image, &template.center_crop(ih, iw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn gradient_data(rows: usize, cols: usize) -> Array2<u8> {
        Array2::from_shape_fn((rows, cols), |(r, c)| ((r * 7 + c * 13) % 31) as u8 * 8)
    }

    fn gradient(rows: usize, cols: usize) -> GrayImage {
        GrayImage::from_array(gradient_data(rows, cols).view())
    }

    #[test]
    fn test_rgb_to_gray() {
        let mut pixels = Array3::zeros((1, 2, 3));
        pixels[[0, 0, 0]] = 255;
        pixels[[0, 1, 1]] = 255;
        let gray = GrayImage::from_pixels(pixels.view());
        assert_eq!(gray.pixel(0, 0), 76);
        assert_eq!(gray.pixel(0, 1), 150);
    }

    #[test]
    fn test_flip_horizontal() {
        let img = GrayImage::from_array(Array2::from_shape_vec((1, 3), vec![1, 2, 3]).unwrap().view());
        let flipped = img.flip_horizontal();
        assert_eq!([flipped.pixel(0, 0), flipped.pixel(0, 1), flipped.pixel(0, 2)], [3, 2, 1]);
    }

    #[test]
    fn test_rotate_quarter_turn_is_counter_clockwise() {
        // Bright block to the right of the center of a 21x21 raster.
        let mut data = Array2::zeros((21, 21));
        data.slice_mut(s![8..13, 14..19]).fill(200u8);
        let rotated = GrayImage::from_array(data.view()).rotate(90.0);
        // A counter-clockwise quarter turn moves it above the center.
        assert!(rotated.pixel(4, 10) > 150);
        assert!(rotated.pixel(10, 16) < 50);
        assert!(rotated.pixel(16, 10) < 50);
    }

    #[test]
    fn test_rotate_full_turn_is_identity() {
        let img = gradient(8, 6);
        assert_eq!(img.rotate(360.0), img);
    }

    #[test]
    fn test_scaled_bounds_size() {
        let img = gradient(300, 200);
        assert_eq!(img.scaled(0.25).dim(), (75, 50));
        assert_eq!(img.scaled(1.5).dim(), (300, 200));
    }

    #[test]
    fn test_template_found_inside_image() {
        let data = gradient_data(20, 24);
        let img = GrayImage::from_array(data.view());
        let template = GrayImage::from_array(data.slice(s![5..12, 8..17]));
        let score = match_template(&img, &template).unwrap();
        assert_relative_eq!(score, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_template_larger_than_image() {
        let img = gradient(10, 10);
        assert!(match_template(&img, &gradient(11, 10)).is_none());

        let data = gradient_data(20, 24);
        let big = GrayImage::from_array(data.view());
        let small = GrayImage::from_array(data.slice(s![2..12, 3..13]));
        let score = alignment_score(&small, &big).unwrap();
        assert_relative_eq!(score, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_flat_window_scores_zero() {
        let flat = GrayImage::from_array(Array2::from_elem((6, 6), 40u8).view());
        let score = match_template(&flat, &gradient(3, 3)).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_crop_clips_to_frame() {
        let frame = Frame::blank(64, 48, 0.0);
        let crop = frame.crop(&Rect::from_tlbr(50.0, 40.0, 80.0, 60.0)).unwrap();
        assert_eq!((crop.width(), crop.height()), (14, 8));

        let reference = capture_reference(&frame, &Rect::from_tlbr(10.0, 10.0, 20.0, 20.0), 65.0)
            .unwrap();
        assert_eq!((reference.width(), reference.height()), (64, 48));
    }
}
