//! Core events emitted by the supervisor

/// Budget transitions emitted by the enforcement loop.
///
/// Per tick, at most one of `LimitReached`, `LimitStillExceeded` and
/// `BudgetRestored` is emitted, followed by zero or more `ProcessTerminated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Usage crossed the limit; the running session is allowed to finish
    LimitReached { used_seconds: u64, limit_seconds: u64 },

    /// Usage is still at or above the limit
    LimitStillExceeded {
        used_seconds: u64,
        limit_seconds: u64,
        graced: bool,
    },

    /// Old ticks aged out and usage dropped back below the limit
    BudgetRestored { used_seconds: u64, limit_seconds: u64 },

    /// A tracked process was terminated
    ProcessTerminated { name: String },
}

impl CoreEvent {
    /// True for the per-tick budget state events
    pub fn is_budget_state(&self) -> bool {
        !matches!(self, CoreEvent::ProcessTerminated { .. })
    }
}
