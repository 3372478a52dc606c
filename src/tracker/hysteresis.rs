//! Absence hysteresis shared by every "reset after sustained emptiness" rule.

/// Counts consecutive frames without evidence and reports expiry once the
/// count reaches a threshold. Any evidence resets the count at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsenceHysteresis {
    threshold: u32,
    empty_frames: u32,
}

impl AbsenceHysteresis {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            empty_frames: 0,
        }
    }

    /// Feed one frame of evidence.
    pub fn record(&mut self, present: bool) {
        if present {
            self.empty_frames = 0;
        } else {
            self.empty_frames = self.empty_frames.saturating_add(1);
        }
    }

    pub fn is_expired(&self) -> bool {
        self.empty_frames >= self.threshold
    }

    pub fn empty_frames(&self) -> u32 {
        self.empty_frames
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.empty_frames = 0;
    }
}

/// How often a cleanup pass that consults [`AbsenceHysteresis`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupTrigger {
    /// Immediate check on every frame
    EveryFrame,
    /// Bulk sweep every `n` frames; `n == 0` behaves like `EveryFrame`
    Every(u64),
}

impl CleanupTrigger {
    pub fn fires_at(self, frame_index: u64) -> bool {
        match self {
            CleanupTrigger::EveryFrame => true,
            CleanupTrigger::Every(0) => true,
            CleanupTrigger::Every(n) => frame_index % n == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_at_threshold() {
        let mut h = AbsenceHysteresis::new(3);
        h.record(false);
        h.record(false);
        assert!(!h.is_expired());
        h.record(false);
        assert!(h.is_expired());
    }

    #[test]
    fn test_evidence_resets_count() {
        let mut h = AbsenceHysteresis::new(3);
        h.record(false);
        h.record(false);
        h.record(true);
        h.record(false);
        assert_eq!(h.empty_frames(), 1);
        assert!(!h.is_expired());
    }

    #[test]
    fn test_trigger_schedule() {
        assert!(CleanupTrigger::EveryFrame.fires_at(7));
        assert!(CleanupTrigger::Every(30).fires_at(60));
        assert!(!CleanupTrigger::Every(30).fires_at(61));
        assert!(CleanupTrigger::Every(0).fires_at(0));
        assert!(CleanupTrigger::Every(0).fires_at(13));
    }
}
