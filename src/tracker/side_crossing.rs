//! Warns when a labelled part drifts into the half of the frame reserved for
//! the opposite side.

use std::collections::HashMap;

use tracing::{info, trace};

use crate::tracker::detection::Side;

/// One armed/disarmed flag per track; a warning fires on the disarmed to
/// armed edge only.
#[derive(Debug, Clone, Default)]
pub struct SideCrossingMonitor {
    right_slot_center_x: f32,
    armed: HashMap<u64, bool>,
}

impl SideCrossingMonitor {
    /// The "right" half of the frame is the one that holds the right slot.
    pub fn new(right_slot_center_x: f32) -> Self {
        Self {
            right_slot_center_x,
            armed: HashMap::new(),
        }
    }

    fn on_wrong_half(&self, assigned: Side, centroid_x: f32, midline: f32) -> bool {
        let right_half_is_low = self.right_slot_center_x < midline;
        let in_right_half = if right_half_is_low {
            centroid_x < midline
        } else {
            centroid_x > midline
        };
        let in_left_half = if right_half_is_low {
            centroid_x > midline
        } else {
            centroid_x < midline
        };
        match assigned {
            Side::Right => in_left_half,
            Side::Left => in_right_half,
        }
    }

    /// Evaluate one track for this frame. Returns `true` when a new
    /// wrong-side warning must be raised.
    pub fn check(&mut self, track_id: u64, centroid_x: f32, assigned: Side, frame_width: f32) -> bool {
        let midline = frame_width / 2.0;
        let violating = self.on_wrong_half(assigned, centroid_x, midline);
        let armed = self.armed.entry(track_id).or_insert(false);
        match (violating, *armed) {
            (true, false) => {
                *armed = true;
                info!(track_id, ?assigned, centroid_x, "part crossed to the wrong side");
                true
            }
            (false, true) => {
                *armed = false;
                trace!(track_id, "part back on its side");
                false
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, track_id: u64) -> bool {
        self.armed.get(&track_id).copied().unwrap_or(false)
    }

    pub fn forget(&mut self, track_id: u64) {
        self.armed.remove(&track_id);
    }

    pub fn clear(&mut self) {
        self.armed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Right slot at x=140 on a 640 wide frame: the right half is x < 320.
    fn monitor() -> SideCrossingMonitor {
        SideCrossingMonitor::new(140.0)
    }

    #[test]
    fn test_sustained_violation_fires_once() {
        let mut m = monitor();
        let mut fired = 0;
        for _ in 0..50 {
            if m.check(7, 450.0, Side::Right, 640.0) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert!(m.is_armed(7));
    }

    #[test]
    fn test_returning_disarms_without_warning() {
        let mut m = monitor();
        assert!(m.check(7, 450.0, Side::Right, 640.0));
        assert!(!m.check(7, 100.0, Side::Right, 640.0));
        assert!(!m.is_armed(7));
        // A second crossing is a new event.
        assert!(m.check(7, 450.0, Side::Right, 640.0));
    }

    #[test]
    fn test_left_label_mirrors_rule() {
        let mut m = monitor();
        assert!(!m.check(2, 500.0, Side::Left, 640.0));
        assert!(m.check(2, 100.0, Side::Left, 640.0));
    }

    #[test]
    fn test_mirrored_layout() {
        // Right slot on the high-x half.
        let mut m = SideCrossingMonitor::new(500.0);
        assert!(!m.check(1, 500.0, Side::Right, 640.0));
        assert!(m.check(1, 100.0, Side::Right, 640.0));
    }
}
