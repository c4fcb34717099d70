//! The Queen: runs a task list through partitioning, delegation and audit.
//!
//! Phases execute strictly in order. Within a phase, tasks are delegated
//! concurrently up to `max_concurrency`. Every submitted task ends up in the
//! result with a terminal status, including tasks that were never started
//! because scheduling halted or a dependency did not pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditOutcome, AuditPipeline, StageValidator, Violation};
use crate::config::{Config, OrchestratorConfig};
use crate::core::{Artifact, MecePartitioner, Task, TaskGraph, TaskId, TaskStatus};
use crate::delegation::{
    A2aExecutor, AgentId, DelegationRequest, DelegationRouter, DelegationStatus, HandlerRegistry,
    Route, SessionContext, SessionId, SessionRegistry,
};
use crate::orchestration::events::OrchestratorEvent;
use crate::orchestration::result::{FailureReason, OrchestrationResult, PhaseReport, TaskReport};
use crate::Result;

/// Per-task input computed before a phase starts.
struct Job {
    task: Task,
    phase: usize,
    /// First dependency that did not pass, when cascading.
    upstream: Option<TaskId>,
    /// Artifact content of passed dependencies, keyed by task id.
    inputs: serde_json::Map<String, serde_json::Value>,
}

/// The Orchestrator partitions a task list, delegates each task through its
/// Princess to a Drone and gates completion on the audit pipeline.
pub struct Orchestrator {
    config: OrchestratorConfig,
    partitioner: MecePartitioner,
    router: DelegationRouter,
    executor: A2aExecutor,
    pipeline: AuditPipeline,
    sessions: Arc<SessionRegistry>,
    cancel: CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator with default settings over `handlers` and `pipeline`.
    pub fn new(handlers: HandlerRegistry, pipeline: AuditPipeline) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        Self {
            config: OrchestratorConfig::default(),
            partitioner: MecePartitioner::default(),
            router: DelegationRouter::with_sessions(Arc::clone(&sessions)),
            executor: A2aExecutor::new(handlers),
            pipeline,
            sessions,
            cancel: CancellationToken::new(),
            event_tx: None,
        }
    }

    /// Build an orchestrator with every setting taken from `config`.
    pub fn from_config(
        config: &Config,
        handlers: HandlerRegistry,
        stages: Vec<Arc<dyn StageValidator>>,
    ) -> Self {
        let pipeline = AuditPipeline::new(stages).with_stage_timeout(config.audit.stage_timeout());
        Self::new(handlers, pipeline)
            .with_config(config.orchestrator.clone())
            .with_partitioner(MecePartitioner::new(config.partition.bottleneck()))
    }

    /// Replace the scheduling settings.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a partitioner with custom bottleneck thresholds.
    pub fn with_partitioner(mut self, partitioner: MecePartitioner) -> Self {
        self.partitioner = partitioner;
        self
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Create an event channel and return its receiving end.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<OrchestratorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    /// Token that stops scheduling new work when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get the scheduling settings.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Get the session registry shared with the router.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Get the audit pipeline.
    pub fn pipeline(&self) -> &AuditPipeline {
        &self.pipeline
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Run `tasks` to completion.
    ///
    /// # Errors
    /// Graph construction errors (cycles, duplicates, unknown dependencies)
    /// abort the run before anything is delegated. Task failures never
    /// produce an `Err`; they are reported in the result.
    pub async fn execute(&self, tasks: Vec<Task>) -> Result<OrchestrationResult> {
        let start = Instant::now();
        let graph = TaskGraph::from_tasks(tasks)?;
        let partition = self.partitioner.partition_graph(&graph)?;

        tracing::info!(
            tasks = graph.task_count(),
            phases = partition.phases.len(),
            bottlenecks = partition.bottlenecks.len(),
            "starting orchestration"
        );
        for bottleneck in &partition.bottlenecks {
            tracing::info!(
                task = %bottleneck.task_id,
                fan_in = bottleneck.fan_in,
                fan_out = bottleneck.fan_out,
                "bottleneck task"
            );
        }

        // A halt cancels only this run's child token.
        let run_token = self.cancel.child_token();
        let mut context = SessionContext::new();
        context.insert("task_count".to_string(), json!(graph.task_count()));
        context.insert("phase_count".to_string(), json!(partition.phases.len()));
        let root = self.sessions.create_session(AgentId::Queen, None, context);

        let mut finished: HashMap<TaskId, TaskReport> = HashMap::new();
        let mut phase_reports = Vec::with_capacity(partition.phases.len());
        let mut halted = false;

        for phase in &partition.phases {
            tracing::info!(phase = phase.index, tasks = phase.len(), "phase started");
            self.emit(OrchestratorEvent::PhaseStarted {
                index: phase.index,
                task_count: phase.len(),
            });

            let jobs: Vec<Job> = phase
                .tasks
                .iter()
                .filter_map(|id| graph.get_task(id))
                .map(|task| self.prepare_job(task, phase.index, &finished))
                .collect();

            let limit = match self.config.max_concurrency {
                0 => jobs.len().max(1),
                n => n,
            };

            let mut reports = stream::iter(jobs)
                .map(|job| self.run_task(job, root.id, &run_token))
                .buffer_unordered(limit);

            let mut phase_results = Vec::with_capacity(phase.len());
            while let Some(report) = reports.next().await {
                if report.status == TaskStatus::Failed
                    && self.config.halt_on_failure
                    && !run_token.is_cancelled()
                {
                    tracing::warn!(task = %report.task_id, "task failed, halting scheduling");
                    run_token.cancel();
                    halted = true;
                    self.emit(OrchestratorEvent::Halted {
                        trigger: Some(report.task_id.clone()),
                    });
                }
                phase_results.push(report);
            }

            if run_token.is_cancelled() && !halted {
                tracing::warn!(phase = phase.index, "orchestration cancelled");
                halted = true;
                self.emit(OrchestratorEvent::Halted { trigger: None });
            }

            let count = |status: TaskStatus| phase_results.iter().filter(|r| r.status == status).count();
            let phase_report = PhaseReport {
                index: phase.index,
                tasks: phase.tasks.clone(),
                passed: count(TaskStatus::Passed),
                failed: count(TaskStatus::Failed),
                cancelled: count(TaskStatus::Cancelled),
            };
            tracing::info!(
                phase = phase.index,
                passed = phase_report.passed,
                failed = phase_report.failed,
                cancelled = phase_report.cancelled,
                "phase completed"
            );
            self.emit(OrchestratorEvent::PhaseCompleted {
                index: phase_report.index,
                passed: phase_report.passed,
                failed: phase_report.failed,
                cancelled: phase_report.cancelled,
            });
            phase_reports.push(phase_report);

            for report in phase_results {
                finished.insert(report.task_id.clone(), report);
            }
        }

        self.sessions.release_tree(&root.id);

        let tasks: Vec<TaskReport> = partition
            .phases
            .iter()
            .flat_map(|phase| phase.tasks.iter())
            .filter_map(|id| finished.remove(id))
            .collect();

        let result = OrchestrationResult {
            phases: phase_reports,
            tasks,
            bottlenecks: partition.bottlenecks,
            halted,
            elapsed: start.elapsed(),
        };

        tracing::info!(
            all_passed = result.all_passed(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "{}",
            result.summary()
        );
        self.emit(OrchestratorEvent::RunComplete {
            all_passed: result.all_passed(),
        });
        Ok(result)
    }

    fn prepare_job(&self, task: &Task, phase: usize, finished: &HashMap<TaskId, TaskReport>) -> Job {
        let mut upstream = None;
        let mut inputs = serde_json::Map::new();

        for dependency in task.unique_dependencies() {
            match finished.get(&dependency) {
                Some(report) if report.passed() => {
                    if let Some(artifact) = &report.artifact {
                        inputs.insert(dependency.to_string(), artifact.content.clone());
                    }
                }
                _ => {
                    if upstream.is_none() && self.config.cascade_failures {
                        upstream = Some(dependency);
                    }
                }
            }
        }

        Job {
            task: task.clone(),
            phase,
            upstream,
            inputs,
        }
    }

    fn set_status(&self, task: &Task) {
        self.emit(OrchestratorEvent::TaskStatusChanged {
            task_id: task.id.clone(),
            status: task.status,
        });
    }

    async fn run_task(&self, job: Job, root: SessionId, token: &CancellationToken) -> TaskReport {
        let Job {
            mut task,
            phase,
            upstream,
            inputs,
        } = job;

        if token.is_cancelled() {
            task.cancel();
            return self.finish(task, phase, None, TaskOutcome::failed(FailureReason::Halted));
        }
        if let Some(dependency) = upstream {
            tracing::info!(task = %task.id, dependency = %dependency, "skipping task, dependency did not pass");
            task.cancel();
            return self.finish(
                task,
                phase,
                None,
                TaskOutcome::failed(FailureReason::UpstreamFailed { dependency }),
            );
        }

        let route = self.router.route(&task.agent_type);
        let princess = AgentId::Princess(route.princess);
        let drone = AgentId::Drone(route.drone);

        let mut context = SessionContext::new();
        context.insert("task_id".to_string(), json!(task.id));
        context.insert("agent_type".to_string(), json!(task.agent_type));
        let princess_session = self
            .router
            .create_session(AgentId::Queen, Some(root), context);

        let mut context = SessionContext::new();
        context.insert("task_id".to_string(), json!(task.id));
        context.insert("drone".to_string(), json!(route.drone));
        let drone_session = self
            .router
            .create_session(princess, Some(princess_session.id), context);

        task.mark_delegated();
        tracing::debug!(
            task = %task.id,
            princess = %route.princess,
            drone = %route.drone,
            "task delegated"
        );
        self.emit(OrchestratorEvent::TaskDelegated {
            task_id: task.id.clone(),
            princess: route.princess,
            drone: route.drone,
        });
        self.set_status(&task);

        let request = DelegationRequest {
            target: drone,
            requester: princess,
            task_id: task.id.clone(),
            task_type: task.agent_type.clone(),
            parameters: json!({
                "description": task.description,
                "estimated_effort": task.estimated_effort,
                "dependencies": inputs,
            }),
            timeout: self.config.request_timeout(),
            session: drone_session,
        };

        task.start();
        self.set_status(&task);
        let response = self.executor.execute(&request).await;

        let outcome = match (response.status, response.artifact) {
            (DelegationStatus::Completed, Some(artifact)) => {
                task.await_audit();
                self.set_status(&task);

                let task_id = task.id.clone();
                let trail = self
                    .pipeline
                    .run_with_retry_inspect(&artifact, self.config.max_retry_attempts, |run| {
                        self.emit(OrchestratorEvent::AuditAttempt {
                            task_id: task_id.clone(),
                            attempt: run.attempt,
                            status: run.status,
                        })
                    })
                    .await;

                let violations = trail.terminal_violations();
                let attempts = trail.attempts();
                let failure = match trail.outcome {
                    AuditOutcome::Passed => None,
                    AuditOutcome::Failed => Some(FailureReason::AuditFailed),
                    AuditOutcome::MaxRetriesExceeded => Some(FailureReason::MaxRetriesExceeded),
                };
                TaskOutcome {
                    failure,
                    audit_attempts: attempts,
                    violations,
                    artifact: Some(artifact),
                }
            }
            (DelegationStatus::Completed, None) => TaskOutcome::failed(
                FailureReason::DelegationFailed {
                    error: "completed without an artifact".to_string(),
                },
            ),
            (DelegationStatus::Failed, _) => TaskOutcome::failed(FailureReason::DelegationFailed {
                error: response.error.unwrap_or_default(),
            }),
            (DelegationStatus::TimedOut, _) => {
                TaskOutcome::failed(FailureReason::DelegationTimedOut)
            }
        };

        if outcome.failure.is_none() {
            task.pass();
        } else {
            task.fail();
        }
        self.sessions.release_tree(&princess_session.id);
        self.finish(task, phase, Some(route), outcome)
    }

    fn finish(
        &self,
        task: Task,
        phase: usize,
        route: Option<Route>,
        outcome: TaskOutcome,
    ) -> TaskReport {
        match &outcome.failure {
            None => tracing::info!(task = %task.id, attempts = outcome.audit_attempts, "task passed"),
            Some(reason) => tracing::warn!(
                task = %task.id,
                status = %task.status,
                reason = %reason,
                "task did not pass"
            ),
        }
        self.emit(OrchestratorEvent::TaskFinished {
            task_id: task.id.clone(),
            status: task.status,
            failure: outcome.failure.clone(),
        });

        let passed = task.status == TaskStatus::Passed;
        TaskReport {
            task_id: task.id,
            phase,
            princess: route.map(|r| r.princess),
            drone: route.map(|r| r.drone),
            status: task.status,
            audit_attempts: outcome.audit_attempts,
            violations: outcome.violations,
            failure: outcome.failure,
            artifact: if passed { outcome.artifact } else { None },
            started_at: task.started_at,
            completed_at: task.completed_at,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("partitioner", &self.partitioner)
            .field("executor", &self.executor)
            .field("pipeline", &self.pipeline)
            .field("live_sessions", &self.sessions.len())
            .finish()
    }
}

/// How a task ended, beyond its status.
struct TaskOutcome {
    failure: Option<FailureReason>,
    audit_attempts: u32,
    violations: Vec<Violation>,
    artifact: Option<Artifact>,
}

impl TaskOutcome {
    fn failed(reason: FailureReason) -> Self {
        Self {
            failure: Some(reason),
            audit_attempts: 0,
            violations: Vec::new(),
            artifact: None,
        }
    }
}
