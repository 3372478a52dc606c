/// Placement lifecycle of a tracked part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum TrackPhase {
    /// Seen, but not sitting in a placement slot
    #[default]
    Idle,
    /// Inside a slot, collecting stability history and orientation samples
    Observing,
    /// Orientation decided; side label assigned
    Settled,
}
