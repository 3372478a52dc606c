//! Sticker matching utilities: left/right conflict resolution and optional
//! frame-to-frame association.

use ndarray::Array2;
use tracing::trace;

use crate::tracker::detection::{Side, StickerObservation};
use crate::tracker::rect::{Rect, iou_batch};

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Optimal one-to-one assignment minimising total cost; pairs costing more
/// than `thresh` are rejected.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_rows: vec![],
            unmatched_cols: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_rows: (0..num_rows).collect(),
            unmatched_cols: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);
    for ((i, j), &cost) in cost_matrix.indexed_iter() {
        padded[[i, j]] = cost as f64;
    }

    let mut matches = vec![];
    let mut unmatched_rows = vec![];
    let mut col_free = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row, &col) in row_to_col.iter().enumerate().take(num_rows) {
                if col < num_cols && cost_matrix[[row, col]] <= thresh {
                    matches.push((row, col));
                    col_free[col] = false;
                } else {
                    unmatched_rows.push(row);
                }
            }
        }
        Err(_) => {
            unmatched_rows = (0..num_rows).collect();
        }
    }

    let unmatched_cols = col_free
        .iter()
        .enumerate()
        .filter_map(|(i, &free)| free.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_rows,
        unmatched_cols,
    }
}

/// Euclidean distance matrix between two point sets.
pub fn centroid_distance(a: &[(f32, f32)], b: &[(f32, f32)]) -> Array2<f32> {
    let mut dists = Array2::zeros((a.len(), b.len()));
    for (i, p) in a.iter().enumerate() {
        for (j, q) in b.iter().enumerate() {
            dists[[i, j]] = ((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt();
        }
    }
    dists
}

/// Drop duplicate stickers reported by both the left and the right detector.
///
/// Each left sticker is paired with its best-overlapping unused right
/// sticker; if their IoU exceeds `iou_threshold` only the more confident one
/// survives.
pub fn resolve_sticker_conflicts(
    stickers: &[StickerObservation],
    iou_threshold: f32,
) -> Vec<StickerObservation> {
    let (left, right): (Vec<StickerObservation>, Vec<StickerObservation>) =
        stickers.iter().copied().partition(|s| s.side == Side::Left);
    if left.is_empty() || right.is_empty() {
        return stickers.to_vec();
    }

    let left_boxes: Vec<Rect> = left.iter().map(|s| s.bbox).collect();
    let right_boxes: Vec<Rect> = right.iter().map(|s| s.bbox).collect();
    let ious = iou_batch(&left_boxes, &right_boxes);

    let mut used_right = vec![false; right.len()];
    let mut resolved = Vec::with_capacity(stickers.len());
    for (i, lsticker) in left.iter().enumerate() {
        let best = (0..right.len())
            .filter(|&j| !used_right[j])
            .map(|j| (j, ious[[i, j]]))
            .filter(|&(_, iou)| iou > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match best {
            Some((j, iou)) if iou > iou_threshold => {
                used_right[j] = true;
                if lsticker.score > right[j].score {
                    resolved.push(*lsticker);
                } else {
                    resolved.push(right[j]);
                }
            }
            _ => resolved.push(*lsticker),
        }
    }
    resolved.extend(
        right
            .iter()
            .zip(used_right)
            .filter(|(_, used)| !used)
            .map(|(s, _)| *s),
    );
    resolved
}

#[derive(Debug, Clone, Copy)]
struct TrackedSticker {
    id: u64,
    center: (f32, f32),
    section: usize,
}

/// Gives stickers persistent ids across frames by nearest-centroid
/// assignment. Purely diagnostic: zone sticker counts do not depend on it.
#[derive(Debug, Clone)]
pub struct StickerAssociator {
    max_distance: f32,
    next_id: u64,
    tracked: Vec<TrackedSticker>,
}

impl StickerAssociator {
    pub fn new(max_distance: f32) -> Self {
        Self {
            max_distance,
            next_id: 0,
            tracked: Vec::new(),
        }
    }

    /// Associate this frame's sticker centers (with their zone index) to the
    /// previous frame's. Returns one id per input, in input order.
    pub fn update(&mut self, observations: &[((f32, f32), usize)]) -> Vec<u64> {
        let previous: Vec<(f32, f32)> = self.tracked.iter().map(|t| t.center).collect();
        let current: Vec<(f32, f32)> = observations.iter().map(|o| o.0).collect();
        let dists = centroid_distance(&previous, &current);
        let result = linear_assignment(&dists, self.max_distance);

        let mut ids = vec![0; observations.len()];
        let mut next = Vec::with_capacity(observations.len());
        for &(prev, cur) in &result.matches {
            let old = self.tracked[prev];
            let (center, section) = observations[cur];
            if old.section != section {
                trace!(sticker_id = old.id, from = old.section, to = section, "sticker changed zone");
            }
            ids[cur] = old.id;
            next.push(TrackedSticker {
                id: old.id,
                center,
                section,
            });
        }
        for &prev in &result.unmatched_rows {
            trace!(sticker_id = self.tracked[prev].id, "sticker lost");
        }
        for &cur in &result.unmatched_cols {
            let (center, section) = observations[cur];
            let id = self.next_id;
            self.next_id += 1;
            trace!(sticker_id = id, zone = section, "sticker appeared");
            ids[cur] = id;
            next.push(TrackedSticker { id, center, section });
        }
        self.tracked = next;
        ids
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
        self.next_id = 0;
    }
}
