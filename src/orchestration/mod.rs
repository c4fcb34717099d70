//! Orchestration layer for the hive.
//!
//! The `Orchestrator` plays the Queen: it partitions the task list into
//! phases, delegates each task through a Princess to a Drone, audits the
//! result, and reports what happened to every task.

mod events;
mod orchestrator;
mod result;

pub use events::OrchestratorEvent;
pub use orchestrator::Orchestrator;
pub use result::{FailureReason, OrchestrationResult, PhaseReport, TaskReport};
