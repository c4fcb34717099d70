//! End-to-end orchestration runs with scripted agents.

use std::sync::Arc;

use tempfile::TempDir;

use hive::audit::{AuditPipeline, RequireContent, StageStatus, StageValidator};
use hive::config::{Config, OrchestratorConfig};
use hive::core::{TaskId, TaskStatus};
use hive::delegation::{EchoHandler, HandlerRegistry};
use hive::orchestration::{FailureReason, Orchestrator, OrchestratorEvent};
use hive::source;

use crate::fixtures::{
    layered_tasks, stages, two_phase_tasks, ConcurrencyGauge, PanickingStage, RecordingHandler,
    ScriptedStage,
};

fn halting() -> OrchestratorConfig {
    OrchestratorConfig {
        halt_on_failure: true,
        ..OrchestratorConfig::default()
    }
}

#[tokio::test]
async fn test_halt_cancels_later_phases_without_invoking_drones() {
    let handler = Arc::new(RecordingHandler::new().failing_on("setup"));
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(handler.clone()),
        AuditPipeline::default(),
    )
    .with_config(halting());

    let result = orchestrator.execute(two_phase_tasks()).await.unwrap();

    assert!(result.halted);
    assert_eq!(result.status_of(&TaskId::from("setup")), Some(TaskStatus::Failed));
    for id in ["api", "ui", "docs"] {
        let report = result.task(&TaskId::from(id)).unwrap();
        assert_eq!(report.status, TaskStatus::Cancelled, "{}", id);
        assert!(!handler.was_invoked(id), "{} should not run", id);
    }
    assert_eq!(handler.invoked(), vec![TaskId::from("setup")]);
    assert_eq!(result.phases[1].cancelled, 3);
    assert!(!result.all_passed());
}

#[tokio::test]
async fn test_halt_mid_phase_cancels_unstarted_siblings() {
    let handler = Arc::new(RecordingHandler::new().failing_on("l0-t0"));
    let config = OrchestratorConfig {
        max_concurrency: 1,
        ..halting()
    };
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(handler.clone()),
        AuditPipeline::default(),
    )
    .with_config(config);

    let result = orchestrator.execute(layered_tasks(3, 1)).await.unwrap();

    assert!(result.halted);
    assert_eq!(handler.invoked(), vec![TaskId::from("l0-t0")]);
    assert_eq!(result.status_of(&TaskId::from("l0-t0")), Some(TaskStatus::Failed));
    for id in ["l0-t1", "l0-t2"] {
        let report = result.task(&TaskId::from(id)).unwrap();
        assert_eq!(report.status, TaskStatus::Cancelled, "{}", id);
        assert_eq!(report.failure, Some(FailureReason::Halted), "{}", id);
    }
    assert_eq!(result.phases[0].failed, 1);
    assert_eq!(result.phases[0].cancelled, 2);
    assert!(orchestrator.sessions().is_empty());
}

#[tokio::test]
async fn test_panicking_stage_fails_task_and_run_completes() {
    let handler = Arc::new(RecordingHandler::new());
    let pipeline = AuditPipeline::new(vec![Arc::new(PanickingStage) as Arc<dyn StageValidator>]);
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(handler.clone()),
        pipeline,
    );

    let result = orchestrator.execute(two_phase_tasks()).await.unwrap();

    let setup = result.task(&TaskId::from("setup")).unwrap();
    assert_eq!(setup.status, TaskStatus::Failed);
    assert_eq!(setup.failure, Some(FailureReason::AuditFailed));
    assert_eq!(setup.audit_attempts, 1);
    for id in ["api", "ui", "docs"] {
        let report = result.task(&TaskId::from(id)).unwrap();
        assert_eq!(report.status, TaskStatus::Cancelled, "{}", id);
        assert!(!handler.was_invoked(id), "{} should not run", id);
    }
    assert!(orchestrator.sessions().is_empty());
}

#[tokio::test]
async fn test_halt_takes_precedence_over_cascade() {
    let handler = Arc::new(RecordingHandler::new().failing_on("setup"));
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(handler),
        AuditPipeline::default(),
    )
    .with_config(halting());

    let result = orchestrator.execute(two_phase_tasks()).await.unwrap();
    let api = result.task(&TaskId::from("api")).unwrap();
    assert_eq!(api.failure, Some(FailureReason::Halted));
}

#[tokio::test]
async fn test_no_task_is_omitted() {
    let handler = Arc::new(RecordingHandler::new().failing_on("l1-t0"));
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(handler),
        AuditPipeline::default(),
    );
    let tasks = layered_tasks(3, 3);

    let result = orchestrator.execute(tasks.clone()).await.unwrap();

    assert_eq!(result.tasks.len(), tasks.len());
    for task in &tasks {
        let status = result.status_of(&task.id).unwrap();
        assert!(status.is_terminal());
    }
    assert_eq!(result.count(TaskStatus::Passed), 5);
    assert_eq!(result.count(TaskStatus::Failed), 1);
    assert_eq!(result.count(TaskStatus::Cancelled), 3);
}

#[tokio::test]
async fn test_retry_counts_recorded_per_task() {
    let flaky = Arc::new(ScriptedStage::new(
        "tests",
        &[StageStatus::FailedRetryable, StageStatus::Passed],
    ));
    let pipeline = AuditPipeline::new(stages(vec![flaky]));
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(Arc::new(EchoHandler)),
        pipeline,
    );

    let result = orchestrator
        .execute(vec![hive::core::Task::new("api", "", "backend")])
        .await
        .unwrap();
    let api = result.task(&TaskId::from("api")).unwrap();
    assert_eq!(api.status, TaskStatus::Passed);
    assert_eq!(api.audit_attempts, 2);
}

#[tokio::test]
async fn test_max_retries_marks_task_failed() {
    let config = OrchestratorConfig {
        max_retry_attempts: 2,
        ..OrchestratorConfig::default()
    };
    let pipeline = AuditPipeline::new(stages(vec![Arc::new(ScriptedStage::always(
        "flaky",
        StageStatus::FailedRetryable,
    ))]));
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(Arc::new(EchoHandler)),
        pipeline,
    )
    .with_config(config);

    let result = orchestrator
        .execute(vec![hive::core::Task::new("api", "", "backend")])
        .await
        .unwrap();
    let api = result.task(&TaskId::from("api")).unwrap();
    assert_eq!(api.status, TaskStatus::Failed);
    assert_eq!(api.failure, Some(FailureReason::MaxRetriesExceeded));
    assert_eq!(api.audit_attempts, 2);
    assert_eq!(api.violations.len(), 1);
}

#[tokio::test]
async fn test_concurrency_limit_respected() {
    let gauge = Arc::new(ConcurrencyGauge::default());
    let config = OrchestratorConfig {
        max_concurrency: 2,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(gauge.clone()),
        AuditPipeline::default(),
    )
    .with_config(config);

    let result = orchestrator.execute(layered_tasks(6, 1)).await.unwrap();
    assert!(result.all_passed());
    assert!(gauge.peak() <= 2);
    assert!(gauge.peak() >= 1);
}

#[tokio::test]
async fn test_sequential_mode() {
    let gauge = Arc::new(ConcurrencyGauge::default());
    let config = OrchestratorConfig {
        max_concurrency: 1,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(gauge.clone()),
        AuditPipeline::default(),
    )
    .with_config(config);

    orchestrator.execute(layered_tasks(4, 2)).await.unwrap();
    assert_eq!(gauge.peak(), 1);
}

#[tokio::test]
async fn test_event_stream_brackets_phases() {
    let mut orchestrator = Orchestrator::new(
        HandlerRegistry::new().with_fallback(Arc::new(EchoHandler)),
        AuditPipeline::new(vec![Arc::new(RequireContent) as Arc<dyn StageValidator>]),
    );
    let mut rx = orchestrator.subscribe();

    orchestrator.execute(two_phase_tasks()).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    let phase_markers: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::PhaseStarted { index, .. } => Some(format!("start-{}", index)),
            OrchestratorEvent::PhaseCompleted { index, .. } => Some(format!("end-{}", index)),
            _ => None,
        })
        .collect();
    assert_eq!(phase_markers, vec!["start-0", "end-0", "start-1", "end-1"]);

    let finished = events
        .iter()
        .filter(|e| matches!(e, OrchestratorEvent::TaskFinished { .. }))
        .count();
    assert_eq!(finished, 4);
    assert!(matches!(
        events.last(),
        Some(OrchestratorEvent::RunComplete { all_passed: true })
    ));
}

#[tokio::test]
async fn test_run_from_task_file_and_config() {
    let dir = TempDir::new().unwrap();
    let tasks_path = dir.path().join("tasks.toml");
    std::fs::write(
        &tasks_path,
        r#"
        [[task]]
        id = "schema"
        agent_type = "database"

        [[task]]
        id = "api"
        agent_type = "backend"
        dependencies = ["schema"]
        "#,
    )
    .unwrap();

    let config_path = dir.path().join("hive.toml");
    std::fs::write(
        &config_path,
        "[orchestrator]\nmax_concurrency = 1\n\n[audit]\nstage_timeout_ms = 500\n",
    )
    .unwrap();
    let config = Config::load_from(&config_path).unwrap();

    let orchestrator = Orchestrator::from_config(
        &config,
        HandlerRegistry::new().with_fallback(Arc::new(EchoHandler)),
        vec![Arc::new(RequireContent) as Arc<dyn StageValidator>],
    );
    assert_eq!(orchestrator.config().max_concurrency, 1);

    let result = orchestrator
        .execute(source::load_tasks(&tasks_path).unwrap())
        .await
        .unwrap();
    assert!(result.all_passed());
    assert_eq!(result.progress(), 100.0);
    assert_eq!(result.phases.len(), 2);
}
