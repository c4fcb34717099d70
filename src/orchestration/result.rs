//! Aggregated outcome of an orchestration run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::Violation;
use crate::core::{Artifact, Bottleneck, TaskId, TaskStatus};
use crate::delegation::{DroneId, PrincessId};

/// Why a task did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The handler returned an error, panicked, or was missing.
    DelegationFailed { error: String },
    DelegationTimedOut,
    /// An audit stage failed non-retryably.
    AuditFailed,
    MaxRetriesExceeded,
    /// A dependency did not pass, so the task was never delegated.
    UpstreamFailed { dependency: TaskId },
    /// Scheduling stopped before the task started.
    Halted,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::DelegationFailed { error } => write!(f, "delegation failed: {}", error),
            FailureReason::DelegationTimedOut => write!(f, "delegation timed out"),
            FailureReason::AuditFailed => write!(f, "audit failed"),
            FailureReason::MaxRetriesExceeded => write!(f, "audit retries exhausted"),
            FailureReason::UpstreamFailed { dependency } => {
                write!(f, "dependency {} did not pass", dependency)
            }
            FailureReason::Halted => write!(f, "halted"),
        }
    }
}

/// Final record for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub phase: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub princess: Option<PrincessId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drone: Option<DroneId>,
    pub status: TaskStatus,
    /// Audit runs made; 0 if the task never reached audit.
    pub audit_attempts: u32,
    /// Violations from the last audit run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// The audited artifact, kept only for tasks that passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskReport {
    pub fn passed(&self) -> bool {
        self.status == TaskStatus::Passed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub index: usize,
    pub tasks: Vec<TaskId>,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl PhaseReport {
    pub fn all_passed(&self) -> bool {
        self.passed == self.tasks.len()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrationResult {
    pub phases: Vec<PhaseReport>,
    /// One report per submitted task, in phase order then by id.
    pub tasks: Vec<TaskReport>,
    pub bottlenecks: Vec<Bottleneck>,
    /// True if scheduling stopped early.
    pub halted: bool,
    pub elapsed: Duration,
}

impl OrchestrationResult {
    /// True iff every task passed. An empty run counts as passed.
    pub fn all_passed(&self) -> bool {
        self.tasks.iter().all(TaskReport::passed)
    }

    pub fn task(&self, id: &TaskId) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| &t.task_id == id)
    }

    pub fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.task(id).map(|t| t.status)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Percentage of tasks that passed.
    pub fn progress(&self) -> f64 {
        if self.tasks.is_empty() {
            return 100.0;
        }
        self.count(TaskStatus::Passed) as f64 / self.tasks.len() as f64 * 100.0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} tasks in {} phases: {} passed, {} failed, {} cancelled ({:.0}%){}",
            self.tasks.len(),
            self.phases.len(),
            self.count(TaskStatus::Passed),
            self.count(TaskStatus::Failed),
            self.count(TaskStatus::Cancelled),
            self.progress(),
            if self.halted { ", halted" } else { "" }
        )
    }
}
