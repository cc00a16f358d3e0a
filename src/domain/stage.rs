//! Per-track import stages.
//!
//! ```text
//! Pending → Acquiring → Persisting → ProbingDuration → Committing → Done
//!               ↓            ↓                            ↓
//!        Skipped | Failed   Skipped | Failed               Failed
//! ```
//!
//! `Committing → Failed` only happens when moving the staged media into
//! place or writing the catalog fails.
//!
//! Cancellation is only observed on the four forward edges leaving
//! `Pending`, `Acquiring`, `Persisting` and `ProbingDuration`. Once a track
//! enters `Committing` it runs to completion.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStage {
    Pending,
    Acquiring,
    Persisting,
    ProbingDuration,
    Committing,
    Done,
    Skipped,
    Failed,
}

impl Default for TrackStage {
    fn default() -> Self {
        Self::Pending
    }
}

impl TrackStage {
    /// Whether `next` is a legal successor of this stage
    pub fn can_transition_to(self, next: TrackStage) -> bool {
        use TrackStage::*;
        matches!(
            (self, next),
            (Pending, Acquiring)
                | (Acquiring, Persisting)
                | (Persisting, ProbingDuration)
                | (ProbingDuration, Committing)
                | (Committing, Done)
                | (Acquiring, Skipped)
                | (Acquiring, Failed)
                | (Persisting, Skipped)
                | (Persisting, Failed)
                | (Committing, Failed)
        )
    }

    /// Terminal stages accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, TrackStage::Done | TrackStage::Skipped | TrackStage::Failed)
    }

    /// Whether a cancellation check runs when leaving this stage
    pub fn checks_cancellation(self) -> bool {
        matches!(
            self,
            TrackStage::Pending
                | TrackStage::Acquiring
                | TrackStage::Persisting
                | TrackStage::ProbingDuration
        )
    }
}

impl std::fmt::Display for TrackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrackStage::Pending => "pending",
            TrackStage::Acquiring => "acquiring",
            TrackStage::Persisting => "persisting",
            TrackStage::ProbingDuration => "probing_duration",
            TrackStage::Committing => "committing",
            TrackStage::Done => "done",
            TrackStage::Skipped => "skipped",
            TrackStage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        use TrackStage::*;
        let path = [Pending, Acquiring, Persisting, ProbingDuration, Committing, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_skip_and_fail_only_from_acquire_or_persist() {
        use TrackStage::*;
        assert!(Acquiring.can_transition_to(Skipped));
        assert!(Persisting.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Skipped));
        assert!(!ProbingDuration.can_transition_to(Failed));
        assert!(!Committing.can_transition_to(Skipped));
        assert!(Committing.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_and_cancellation_points() {
        assert!(TrackStage::Done.is_terminal());
        assert!(!TrackStage::Committing.is_terminal());
        assert!(!TrackStage::Committing.checks_cancellation());
        assert!(TrackStage::ProbingDuration.checks_cancellation());
    }
}
