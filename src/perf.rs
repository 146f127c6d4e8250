//! Latency budgets for verification steps.
//!
//! Every step of a run is timed against a budget. A step that finishes but
//! blows its budget is still a success; the report flags it and a warning
//! is logged, which is usually the first sign of an overloaded deployment.
//!
//! | Tier | Target | Warning | Critical | Steps |
//! |------|--------|---------|----------|-------|
//! | Fast | <10ms | 50ms | 500ms | disconnect |
//! | Normal | <100ms | 500ms | 5s | connect, version, collection, insert, search |
//! | Slow | <1s | 5s | 30s | index build, load |

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::report::Step;

/// Performance budget for an operation.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    /// Name of the operation.
    pub name: &'static str,
    /// Target latency (expected p99).
    pub target: Duration,
    /// Warning threshold (log warning if exceeded).
    pub warning: Duration,
    /// Critical threshold.
    pub critical: Duration,
}

impl Budget {
    /// Create a new budget with the given thresholds.
    pub const fn new(
        name: &'static str,
        target_ms: u64,
        warning_ms: u64,
        critical_ms: u64,
    ) -> Self {
        Self {
            name,
            target: Duration::from_millis(target_ms),
            warning: Duration::from_millis(warning_ms),
            critical: Duration::from_millis(critical_ms),
        }
    }

    /// Create a budget for fast operations (<10ms target).
    pub const fn fast(name: &'static str) -> Self {
        Self::new(name, 10, 50, 500)
    }

    /// Create a budget for normal operations (<100ms target).
    pub const fn normal(name: &'static str) -> Self {
        Self::new(name, 100, 500, 5000)
    }

    /// Create a budget for slow operations (<1s target).
    pub const fn slow(name: &'static str) -> Self {
        Self::new(name, 1000, 5000, 30000)
    }

    /// Get the status of a duration relative to this budget.
    pub fn status(&self, duration: Duration) -> BudgetStatus {
        if duration <= self.target {
            BudgetStatus::OnTarget
        } else if duration <= self.warning {
            BudgetStatus::Acceptable
        } else if duration <= self.critical {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Exceeded
        }
    }
}

/// Status of an operation relative to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Duration is within target.
    OnTarget,
    /// Duration exceeds target but is acceptable.
    Acceptable,
    /// Duration exceeds warning threshold.
    Warning,
    /// Duration exceeds critical threshold.
    Exceeded,
}

impl BudgetStatus {
    /// Check if this status is acceptable.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::OnTarget | Self::Acceptable)
    }
}

pub const CONNECT: Budget = Budget::normal("connect");
pub const SERVER_VERSION: Budget = Budget::normal("server_version");
pub const PREPARE_COLLECTION: Budget = Budget::normal("prepare_collection");
pub const INSERT: Budget = Budget::normal("insert");
pub const BUILD_INDEX: Budget = Budget::slow("build_index");
pub const LOAD: Budget = Budget::slow("load");
pub const SEARCH: Budget = Budget::normal("search");
pub const CLEANUP: Budget = Budget::normal("cleanup");
pub const DISCONNECT: Budget = Budget::fast("disconnect");

/// Budget that applies to a step.
#[must_use]
pub const fn budget_for(step: Step) -> Budget {
    match step {
        Step::Connect => CONNECT,
        Step::ServerVersion => SERVER_VERSION,
        Step::PrepareCollection => PREPARE_COLLECTION,
        Step::Insert => INSERT,
        Step::BuildIndex => BUILD_INDEX,
        Step::Load => LOAD,
        Step::Search => SEARCH,
        Step::Cleanup => CLEANUP,
        Step::Disconnect => DISCONNECT,
    }
}

/// A timer that tracks operation duration and checks against a budget.
#[derive(Debug)]
pub struct Timer {
    budget: Budget,
    start: Instant,
}

impl Timer {
    /// Start a new timer for the given budget.
    pub fn start(budget: Budget) -> Self {
        Self {
            budget,
            start: Instant::now(),
        }
    }

    /// Stop the timer, log against the budget, and return the duration
    /// with its status.
    pub fn stop(self) -> (Duration, BudgetStatus) {
        let duration = self.start.elapsed();
        let status = self.budget.status(duration);

        match status {
            BudgetStatus::OnTarget | BudgetStatus::Acceptable => {
                debug!(
                    operation = self.budget.name,
                    duration_ms = duration.as_millis(),
                    target_ms = self.budget.target.as_millis(),
                    "Step finished"
                );
            }
            BudgetStatus::Warning => {
                warn!(
                    operation = self.budget.name,
                    duration_ms = duration.as_millis(),
                    warning_ms = self.budget.warning.as_millis(),
                    "Step exceeded warning threshold"
                );
            }
            BudgetStatus::Exceeded => {
                warn!(
                    operation = self.budget.name,
                    duration_ms = duration.as_millis(),
                    critical_ms = self.budget.critical.as_millis(),
                    "Step exceeded critical threshold"
                );
            }
        }

        (duration, status)
    }
}
