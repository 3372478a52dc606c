//! Stillness check for a part sitting in a placement slot.

use std::collections::VecDeque;

use crate::tracker::rect::Rect;

/// Bounded history of the most recent boxes of one track.
///
/// Pushing beyond capacity drops the oldest box.
#[derive(Debug, Clone)]
pub struct BoxHistory {
    boxes: VecDeque<Rect>,
    capacity: usize,
}

impl BoxHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            boxes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, bbox: Rect) {
        if self.boxes.len() == self.capacity {
            self.boxes.pop_front();
        }
        self.boxes.push_back(bbox);
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.boxes.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rect> {
        self.boxes.iter()
    }
}

/// Decides whether a tracked box has stopped moving.
#[derive(Debug, Clone, Copy)]
pub struct StabilityGate {
    movement_threshold: f32,
}

impl StabilityGate {
    pub fn new(movement_threshold: f32) -> Self {
        Self { movement_threshold }
    }

    /// Stable only when the history is full and every stored box is within
    /// the movement threshold of `current` on all four coordinates.
    pub fn is_stable(&self, current: &Rect, history: &BoxHistory) -> bool {
        history.is_full()
            && history
                .iter()
                .all(|past| past.max_corner_delta(current) < self.movement_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(boxes: &[Rect], capacity: usize) -> BoxHistory {
        let mut history = BoxHistory::new(capacity);
        for b in boxes {
            history.push(*b);
        }
        history
    }

    #[test]
    fn test_partial_history_is_never_stable() {
        let gate = StabilityGate::new(5.0);
        let b = Rect::from_tlbr(100.0, 100.0, 150.0, 150.0);
        let history = filled(&[b; 4], 5);
        assert!(!gate.is_stable(&b, &history));
    }

    #[test]
    fn test_full_still_history_is_stable() {
        let gate = StabilityGate::new(5.0);
        let current = Rect::from_tlbr(100.0, 100.0, 150.0, 150.0);
        let jitter = Rect::from_tlbr(102.0, 98.0, 154.9, 151.0);
        let history = filled(&[current, jitter, current, jitter, current], 5);
        assert!(gate.is_stable(&current, &history));
    }

    #[test]
    fn test_one_moved_box_breaks_stability() {
        let gate = StabilityGate::new(5.0);
        let current = Rect::from_tlbr(100.0, 100.0, 150.0, 150.0);
        let moved = Rect::from_tlbr(100.0, 100.0, 155.0, 150.0);
        let history = filled(&[moved, current, current, current, current], 5);
        assert!(!gate.is_stable(&current, &history));
    }

    #[test]
    fn test_history_drops_oldest() {
        let a = Rect::from_tlbr(0.0, 0.0, 10.0, 10.0);
        let far = Rect::from_tlbr(300.0, 0.0, 310.0, 10.0);
        let mut history = filled(&[far, a, a], 3);
        assert!(!StabilityGate::new(5.0).is_stable(&a, &history));
        history.push(a);
        assert_eq!(history.len(), 3);
        assert!(StabilityGate::new(5.0).is_stable(&a, &history));
    }
}
