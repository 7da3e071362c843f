//! Sync cycle phases, triggers and outcomes.

use std::fmt;

use crate::models::SyncConflict;

/// Where the orchestrator is within a cycle.
///
/// `Idle → BackingUp → Pulling → Merging → PersistingLocal → Pushing → Done`,
/// with failures in `Pulling`, `PersistingLocal` or `Pushing` going through
/// `RollingBack` back to `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    BackingUp,
    Pulling,
    Merging,
    PersistingLocal,
    Pushing,
    Done,
    RollingBack,
}

impl SyncPhase {
    /// Phases whose failure requires restoring the local snapshot.
    pub const fn needs_rollback(self) -> bool {
        matches!(self, Self::Pulling | Self::PersistingLocal | Self::Pushing)
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BackingUp => "backing up",
            Self::Pulling => "pulling",
            Self::Merging => "merging",
            Self::PersistingLocal => "persisting local",
            Self::Pushing => "pushing",
            Self::Done => "done",
            Self::RollingBack => "rolling back",
        };
        f.write_str(name)
    }
}

/// What started a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncTrigger {
    Manual,
    Login,
    Interval,
    Teardown,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manual => "manual",
            Self::Login => "login",
            Self::Interval => "interval",
            Self::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

/// Notification sent after a cycle reaches `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    Completed,
}

/// Record counts after a successful cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub todos: usize,
    pub plans: usize,
    pub notes: usize,
    pub pulled_new: usize,
    pub pushed_new: usize,
    pub conflicts: Vec<SyncConflict>,
}

/// Why a trigger did not start a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Unauthenticated,
    InFlight,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncSummary),
    Skipped(SkipReason),
    /// The cycle failed in `phase`; local state was restored when needed.
    Failed { phase: SyncPhase, message: String },
}

impl SyncOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
