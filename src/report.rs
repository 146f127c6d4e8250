//! Run report types.
//!
//! A verification run produces one [`StepReport`] per step it attempted and
//! a [`RunReport`] summarizing the whole run. Both serialize to JSON for
//! `--format json`.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;

use crate::error::ErrorCategory;
use crate::model::SearchHit;
use crate::perf::BudgetStatus;

/// The steps of a verification run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Connect,
    ServerVersion,
    PrepareCollection,
    Insert,
    BuildIndex,
    Load,
    Search,
    Cleanup,
    Disconnect,
}

impl Step {
    pub const ALL: [Self; 9] = [
        Self::Connect,
        Self::ServerVersion,
        Self::PrepareCollection,
        Self::Insert,
        Self::BuildIndex,
        Self::Load,
        Self::Search,
        Self::Cleanup,
        Self::Disconnect,
    ];

    /// Short human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Connect => "Connect",
            Self::ServerVersion => "Server version",
            Self::PrepareCollection => "Prepare collection",
            Self::Insert => "Insert sample data",
            Self::BuildIndex => "Build index",
            Self::Load => "Load collection",
            Self::Search => "Search",
            Self::Cleanup => "Drop collection",
            Self::Disconnect => "Disconnect",
        }
    }
}

/// Status for an individual step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pass,
    Warning,
    Error,
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub status: StepStatus,
    pub message: String,
    pub duration_ms: u64,
    pub budget: BudgetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl StepReport {
    /// One-line rendering used for live progress output.
    #[must_use]
    pub fn render_line(&self) -> String {
        let mark = match self.status {
            StepStatus::Pass => "✓".green(),
            StepStatus::Warning => "!".yellow(),
            StepStatus::Error => "✗".red(),
        };
        let mut line = format!(
            "  {} {:<20} {} {}",
            mark,
            self.step.label(),
            self.message,
            format!("({} ms)", self.duration_ms).dimmed()
        );
        if !self.budget.is_ok() {
            let _ = write!(line, " {}", "slow".yellow());
        }
        line
    }
}

/// Why a run failed.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub step: Step,
    pub category: ErrorCategory,
    pub message: String,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub alias: String,
    pub endpoint: String,
    pub collection: String,
    pub strict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_hit: Option<SearchHit>,
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl RunReport {
    /// Start an empty report.
    #[must_use]
    pub fn new(alias: &str, endpoint: &str, collection: &str, strict: bool) -> Self {
        Self {
            started_at: Utc::now(),
            alias: alias.to_string(),
            endpoint: endpoint.to_string(),
            collection: collection.to_string(),
            strict,
            server_version: None,
            inserted: None,
            top_hit: None,
            steps: Vec::new(),
            failure: None,
        }
    }

    /// Whether the run finished without a fatal failure.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Report for a given step, if it ran.
    #[must_use]
    pub fn step(&self, step: Step) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step == step)
    }

    /// Number of steps that ended with a warning.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Warning)
            .count()
    }

    /// Total wall time of the steps that ran.
    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }

    /// Closing summary for text output.
    #[must_use]
    pub fn render_summary(&self) -> String {
        let mut out = String::new();

        if let Some(hit) = &self.top_hit {
            let _ = writeln!(
                out,
                "First result ID: {}, distance: {}",
                hit.id.to_string().cyan(),
                hit.distance
            );
        }

        match &self.failure {
            None if self.warning_count() == 0 => {
                let _ = write!(
                    out,
                    "{} {}",
                    "Test completed successfully!".bold().green(),
                    format!("({} ms)", self.total_ms()).dimmed()
                );
            }
            None => {
                let _ = write!(
                    out,
                    "{} with {} warning(s) {}",
                    "Test completed".bold().yellow(),
                    self.warning_count(),
                    format!("({} ms)", self.total_ms()).dimmed()
                );
            }
            Some(failure) => {
                let _ = write!(
                    out,
                    "{} at step '{}' ({} error)",
                    "Test failed".bold().red(),
                    failure.step.label(),
                    failure.category
                );
            }
        }
        out
    }
}
