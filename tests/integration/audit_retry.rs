//! Audit pipeline tests with scripted stages.

use std::sync::Arc;

use serde_json::json;

use hive::audit::{AuditOutcome, AuditPipeline, AuditRunStatus, StageStatus};
use hive::core::{Artifact, TaskId};
use hive::delegation::{AgentId, DroneId};

use crate::fixtures::{stages, ScriptedStage};

fn artifact() -> Artifact {
    Artifact::new(
        TaskId::from("api"),
        AgentId::Drone(DroneId::BackendDev),
        json!({"files": ["src/api.rs"]}),
    )
}

#[tokio::test]
async fn test_retryable_stage_passes_on_second_attempt() {
    let first = Arc::new(ScriptedStage::always("syntax", StageStatus::Passed));
    let second = Arc::new(ScriptedStage::new(
        "tests",
        &[StageStatus::FailedRetryable, StageStatus::Passed],
    ));
    let third = Arc::new(ScriptedStage::always("review", StageStatus::Passed));
    let pipeline = AuditPipeline::new(stages(vec![
        Arc::clone(&first),
        Arc::clone(&second),
        Arc::clone(&third),
    ]));

    let trail = pipeline.run_with_retry(&artifact(), 3).await;

    assert_eq!(trail.outcome, AuditOutcome::Passed);
    assert_eq!(trail.runs.len(), 2);
    assert_eq!(trail.runs[0].status, AuditRunStatus::Retryable);
    assert_eq!(trail.runs[0].stages.len(), 2);
    assert_eq!(trail.runs[1].status, AuditRunStatus::Passed);
    assert_eq!(trail.runs[1].stages.len(), 3);

    assert_eq!(first.calls(), 2);
    assert_eq!(second.calls(), 2);
    assert_eq!(third.calls(), 1);
}

#[tokio::test]
async fn test_always_retryable_exhausts_attempts() {
    let first = Arc::new(ScriptedStage::always("syntax", StageStatus::FailedRetryable));
    let rest = Arc::new(ScriptedStage::always("tests", StageStatus::Passed));
    let pipeline = AuditPipeline::new(stages(vec![
        Arc::clone(&first),
        Arc::clone(&rest),
        Arc::new(ScriptedStage::always("review", StageStatus::Passed)),
    ]));

    let trail = pipeline.run_with_retry(&artifact(), 3).await;

    assert_eq!(trail.outcome, AuditOutcome::MaxRetriesExceeded);
    assert_eq!(trail.runs.len(), 3);
    assert!(trail.runs.iter().all(|r| r.stages.len() == 1));
    assert_eq!(first.calls(), 3);
    assert_eq!(rest.calls(), 0);
}

#[tokio::test]
async fn test_terminal_failure_is_not_retried() {
    let stage = Arc::new(ScriptedStage::always("theater", StageStatus::Failed));
    let pipeline = AuditPipeline::new(stages(vec![Arc::clone(&stage)]));

    let trail = pipeline.run_with_retry(&artifact(), 5).await;

    assert_eq!(trail.outcome, AuditOutcome::Failed);
    assert_eq!(trail.attempts(), 1);
    assert_eq!(stage.calls(), 1);
    assert_eq!(trail.terminal_violations()[0].description, "theater rejected");
}

#[tokio::test]
async fn test_attempt_numbers_are_sequential() {
    let pipeline = AuditPipeline::new(stages(vec![Arc::new(ScriptedStage::always(
        "flaky",
        StageStatus::FailedRetryable,
    ))]));
    let trail = pipeline.run_with_retry(&artifact(), 4).await;
    let attempts: Vec<u32> = trail.runs.iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4]);
}
