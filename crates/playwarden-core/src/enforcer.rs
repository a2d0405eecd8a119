//! Weekly budget enforcement state machine

use playwarden_host_api::ProcessRegistry;
use tracing::{debug, info};

use crate::CoreEvent;

/// Budget state derived from two consecutive usage readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetState {
    /// Below the limit
    WithinBudget,
    /// Crossed the limit since the previous reading
    NewlyOver,
    /// Still over, but the session that crossed the limit is still running
    StillOverGraced,
    /// Still over and no grace applies: tracked processes are terminated
    StillOverEnforced,
}

/// Outcome of evaluating one reading, before any process is killed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub state: BudgetState,
    pub event: Option<CoreEvent>,
}

impl Verdict {
    pub fn should_kill(&self) -> bool {
        self.state == BudgetState::StillOverEnforced
    }
}

/// Enforcement state owned by the enforcement loop.
///
/// `last_usage` and the grace flag never leave this struct, so no other task
/// can observe a half-updated state.
#[derive(Debug, Clone)]
pub struct Enforcer {
    limit: u64,
    last_usage: u64,
    graced: bool,
}

impl Enforcer {
    pub fn new(limit_seconds: u64) -> Self {
        Self {
            limit: limit_seconds,
            last_usage: 0,
            graced: false,
        }
    }

    pub fn limit_seconds(&self) -> u64 {
        self.limit
    }

    pub fn last_usage(&self) -> u64 {
        self.last_usage
    }

    pub fn is_graced(&self) -> bool {
        self.graced
    }

    /// Classify `current` against the previous reading and update state.
    ///
    /// Does not touch any process. The grace flag is cleared after
    /// classification whenever no tracked process is active.
    pub fn evaluate(&mut self, current: u64, active: bool) -> Verdict {
        let limit = self.limit;
        let was_over = self.last_usage >= limit;

        let verdict = if current < limit {
            Verdict {
                state: BudgetState::WithinBudget,
                event: was_over.then_some(CoreEvent::BudgetRestored {
                    used_seconds: current,
                    limit_seconds: limit,
                }),
            }
        } else if !was_over {
            self.graced = true;
            Verdict {
                state: BudgetState::NewlyOver,
                event: Some(CoreEvent::LimitReached {
                    used_seconds: current,
                    limit_seconds: limit,
                }),
            }
        } else {
            let graced = self.graced;
            Verdict {
                state: if graced {
                    BudgetState::StillOverGraced
                } else {
                    BudgetState::StillOverEnforced
                },
                event: Some(CoreEvent::LimitStillExceeded {
                    used_seconds: current,
                    limit_seconds: limit,
                    graced,
                }),
            }
        };

        self.last_usage = current;
        if !active {
            self.graced = false;
        }

        verdict
    }

    /// Run one enforcement tick and return the events in delivery order.
    pub async fn tick(
        &mut self,
        current: u64,
        active: bool,
        registry: &dyn ProcessRegistry,
        tracked: &[String],
    ) -> Vec<CoreEvent> {
        let verdict = self.evaluate(current, active);
        let mut events = Vec::with_capacity(1);

        match &verdict.event {
            Some(CoreEvent::LimitReached { .. }) => {
                info!(
                    used = current,
                    limit = self.limit,
                    "Weekly limit reached; current session may finish"
                );
            }
            Some(CoreEvent::BudgetRestored { .. }) => {
                info!(used = current, limit = self.limit, "Weekly budget restored");
            }
            Some(CoreEvent::LimitStillExceeded { graced, .. }) => {
                debug!(used = current, limit = self.limit, graced, "Weekly limit still exceeded");
            }
            _ => {}
        }

        let kill = verdict.should_kill();
        events.extend(verdict.event);

        if kill {
            for name in tracked {
                if registry.kill(name).await {
                    info!(process = %name, "Terminated tracked process over weekly limit");
                    events.push(CoreEvent::ProcessTerminated { name: name.clone() });
                } else {
                    debug!(process = %name, "Nothing terminated for tracked name");
                }
            }
        }

        events
    }
}
