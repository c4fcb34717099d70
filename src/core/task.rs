//! Task data model for the delegation DAG.
//!
//! Tasks are the atomic units of work handed down the Queen → Princess →
//! Drone hierarchy. Each task names its dependencies, the agent type that
//! should handle it, and tracks its lifecycle status as the orchestrator
//! moves it through delegation and audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a task, supplied by the caller.
///
/// Identifiers are ordered lexicographically; that ordering is used to break
/// ties when laying out phases so partitions are reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a task identifier from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the identifier is blank.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task status in its lifecycle.
///
/// `Pending → Delegated → InProgress → AuditPending → Passed | Failed`,
/// with `Cancelled` reachable from any non-terminal state when the
/// orchestrator stops scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, not yet routed.
    #[default]
    Pending,
    /// Routed to a Princess/Drone pair and a session created.
    Delegated,
    /// The delegation request is executing.
    InProgress,
    /// The artifact is going through the audit pipeline.
    AuditPending,
    /// Audit passed.
    Passed,
    /// Delegation or audit failed.
    Failed,
    /// Never started because scheduling stopped.
    Cancelled,
}

impl TaskStatus {
    /// Passed, Failed and Cancelled are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Passed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Delegated => write!(f, "delegated"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::AuditPending => write!(f, "audit_pending"),
            TaskStatus::Passed => write!(f, "passed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn default_agent_type() -> String {
    "general".to_string()
}

/// A single task in the delegation DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Human-readable description of the work.
    #[serde(default)]
    pub description: String,
    /// Tasks that must pass before this one may start, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Estimated effort (informational only).
    #[serde(default)]
    pub estimated_effort: f64,
    /// Routing tag used to pick a Princess and Drone.
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    /// Current lifecycle status.
    #[serde(default)]
    pub status: TaskStatus,
    /// When the task started executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task with no dependencies.
    pub fn new(id: impl Into<TaskId>, description: &str, agent_type: &str) -> Self {
        Self {
            id: id.into(),
            description: description.to_string(),
            dependencies: Vec::new(),
            estimated_effort: 0.0,
            agent_type: agent_type.to_string(),
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    /// Set the dependencies of this task.
    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the effort estimate.
    pub fn with_effort(mut self, effort: f64) -> Self {
        self.estimated_effort = effort;
        self
    }

    /// Dependencies with duplicates removed, first occurrence wins.
    pub fn unique_dependencies(&self) -> Vec<TaskId> {
        let mut seen = std::collections::HashSet::new();
        self.dependencies
            .iter()
            .filter(|d| seen.insert(*d))
            .cloned()
            .collect()
    }

    /// Record that the task has been routed to an agent.
    pub fn mark_delegated(&mut self) {
        self.status = TaskStatus::Delegated;
    }

    /// Start executing the delegation request.
    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Hand the produced artifact to the audit pipeline.
    pub fn await_audit(&mut self) {
        self.status = TaskStatus::AuditPending;
    }

    /// Mark the task as passed.
    pub fn pass(&mut self) {
        self.finish(TaskStatus::Passed);
    }

    /// Mark the task as failed.
    pub fn fail(&mut self) {
        self.finish(TaskStatus::Failed);
    }

    /// Mark the task as cancelled.
    pub fn cancel(&mut self) {
        self.finish(TaskStatus::Cancelled);
    }

    fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Check if the task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
