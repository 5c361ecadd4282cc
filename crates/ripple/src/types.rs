//! Core identifiers and state machines
//!
//! Waves and participants are identified by counter-minted ids so they can
//! be named in diagnostics without holding references.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaveId(u64);

impl WaveId {
    /// Mint a fresh wave id
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Mint a fresh participant id
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participation state of a node, scoped to one wave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not part of any wave
    Ready,
    /// Enrolled in a wave, not yet resolved
    Engaged,
    /// Per-wave output computed; awaiting cleanup
    Resolved,
}

/// Phases of a wave, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WavePhase {
    /// Created; accepting seed participants
    New,
    /// Closing over the correlated reachability set
    Engagement,
    /// Booting and resolving participants in dependency order
    Resolution,
    /// Resetting per-wave state
    Cleanup,
    /// Finished; rejects everything
    Dead,
}

impl WavePhase {
    /// Whether participants may still be admitted
    pub fn accepts_participants(&self) -> bool {
        matches!(self, WavePhase::New | WavePhase::Engagement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ParticipantId::next();
        let b = ParticipantId::next();
        let c = ParticipantId::next();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_phase_admission_window() {
        assert!(WavePhase::New.accepts_participants());
        assert!(WavePhase::Engagement.accepts_participants());
        assert!(!WavePhase::Resolution.accepts_participants());
        assert!(!WavePhase::Cleanup.accepts_participants());
        assert!(!WavePhase::Dead.accepts_participants());
    }
}
