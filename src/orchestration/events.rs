//! Progress events emitted while an orchestration runs.
//!
//! Subscribers receive these over a tokio mpsc channel to react to task and
//! phase transitions without polling.

use crate::audit::AuditRunStatus;
use crate::core::{TaskId, TaskStatus};
use crate::delegation::{DroneId, PrincessId};
use crate::orchestration::result::FailureReason;

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    /// A phase is about to start delegating.
    PhaseStarted {
        index: usize,
        task_count: usize,
    },
    /// A task was routed and its sessions opened.
    TaskDelegated {
        task_id: TaskId,
        princess: PrincessId,
        drone: DroneId,
    },
    TaskStatusChanged {
        task_id: TaskId,
        status: TaskStatus,
    },
    /// One audit run over a task's artifact finished.
    AuditAttempt {
        task_id: TaskId,
        attempt: u32,
        status: AuditRunStatus,
    },
    /// A task reached a terminal status.
    TaskFinished {
        task_id: TaskId,
        status: TaskStatus,
        failure: Option<FailureReason>,
    },
    PhaseCompleted {
        index: usize,
        passed: usize,
        failed: usize,
        cancelled: usize,
    },
    /// Scheduling stopped. `trigger` is the failed task, or `None` when the
    /// run was cancelled from outside.
    Halted {
        trigger: Option<TaskId>,
    },
    RunComplete {
        all_passed: bool,
    },
}
