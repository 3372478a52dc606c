/// Axis-aligned bounding box in pixel coordinates.
///
/// Stored as top-left corner plus size (TLWH). Detectors report boxes in
/// TLBR form (x1, y1, x2, y2); use [`Rect::from_tlbr`] for those.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from TLBR format. Corners given in any order are normalized.
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Whether a point lies inside the box, borders included.
    #[inline]
    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        let [x1, y1, x2, y2] = self.to_tlbr();
        x1 <= px && px <= x2 && y1 <= py && py <= y2
    }

    /// Whether this box's center lies inside `region`.
    #[inline]
    pub fn center_in(&self, region: &Rect) -> bool {
        let (cx, cy) = self.center();
        region.contains_point(cx, cy)
    }

    /// Largest absolute difference over the four TLBR coordinates.
    pub fn max_corner_delta(&self, other: &Rect) -> f32 {
        let a = self.to_tlbr();
        let b = other.to_tlbr();
        a.iter()
            .zip(b.iter())
            .map(|(p, q)| (p - q).abs())
            .fold(0.0, f32::max)
    }

    /// Grow the box by `margin` on every side.
    pub fn expand(&self, margin: f32) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Integer pixel bounds `(x1, y1, x2, y2)` clipped to a `width` x `height`
    /// raster. Returns `None` when nothing of the box remains.
    pub fn clip_to(&self, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
        let [x1, y1, x2, y2] = self.to_tlbr();
        let x1 = x1.floor().max(0.0) as usize;
        let y1 = y1.floor().max(0.0) as usize;
        let x2 = (x2.ceil().max(0.0) as usize).min(width);
        let y2 = (y2.ceil().max(0.0) as usize).min(height);
        if x1 >= x2 || y1 >= y2 {
            None
        } else {
            Some((x1, y1, x2, y2))
        }
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    pub fn iou(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter_width = (x2 - x1).max(0.0);
        let inter_height = (y2 - y1).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

use ndarray::Array2;

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}
