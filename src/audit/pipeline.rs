//! Multi-stage audit pipeline with bounded retry.
//!
//! A run walks the stages in order and stops at the first stage that does
//! not pass. `run_with_retry` repeats runs while the result is retryable, up
//! to a caller-supplied attempt cap that has nothing to do with how many
//! stages the pipeline has.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::audit::types::{
    AuditOutcome, AuditRun, AuditRunStatus, AuditStageResult, AuditTrail, Severity,
    StageStatus, StageVerdict, Violation,
};
use crate::config::DEFAULT_STAGE_TIMEOUT_MS;
use crate::core::Artifact;

/// One stage of the pipeline.
#[async_trait]
pub trait StageValidator: Send + Sync {
    /// Stage name used in results and logs.
    fn name(&self) -> &str;

    /// Check the artifact and report a verdict with any violations.
    async fn validate(&self, artifact: &Artifact) -> StageVerdict;
}

/// Ordered audit stages sharing one per-stage timeout.
#[derive(Clone)]
pub struct AuditPipeline {
    stages: Vec<Arc<dyn StageValidator>>,
    stage_timeout: Duration,
}

impl Default for AuditPipeline {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for AuditPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditPipeline")
            .field("stages", &self.stage_names())
            .field("stage_timeout", &self.stage_timeout)
            .finish()
    }
}

impl AuditPipeline {
    /// Create a pipeline running `stages` in order with the default timeout.
    pub fn new(stages: Vec<Arc<dyn StageValidator>>) -> Self {
        Self {
            stages,
            stage_timeout: Duration::from_millis(DEFAULT_STAGE_TIMEOUT_MS),
        }
    }

    /// Append a stage after the existing ones.
    pub fn with_stage(mut self, stage: Arc<dyn StageValidator>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Set how long a single stage may run.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// First attempt at auditing `artifact`.
    pub async fn run(&self, artifact: &Artifact) -> AuditRun {
        self.run_attempt(artifact, 1).await
    }

    /// Audit again from the first stage, numbering the run after `previous`.
    pub async fn retry(&self, artifact: &Artifact, previous: &AuditRun) -> AuditRun {
        self.run_attempt(artifact, previous.attempt + 1).await
    }

    /// Run until Passed, Failed, or `max_attempts` runs have been made.
    pub async fn run_with_retry(&self, artifact: &Artifact, max_attempts: u32) -> AuditTrail {
        self.run_with_retry_inspect(artifact, max_attempts, |_| {})
            .await
    }

    /// Like `run_with_retry`, calling `inspect` after every run.
    pub async fn run_with_retry_inspect<F>(
        &self,
        artifact: &Artifact,
        max_attempts: u32,
        mut inspect: F,
    ) -> AuditTrail
    where
        F: FnMut(&AuditRun),
    {
        let mut runs: Vec<AuditRun> = Vec::new();

        while (runs.len() as u32) < max_attempts {
            let run = match runs.last() {
                None => self.run(artifact).await,
                Some(previous) => self.retry(artifact, previous).await,
            };
            inspect(&run);

            let status = run.status;
            runs.push(run);
            match status {
                AuditRunStatus::Passed => {
                    return AuditTrail {
                        runs,
                        outcome: AuditOutcome::Passed,
                    }
                }
                AuditRunStatus::Failed => {
                    return AuditTrail {
                        runs,
                        outcome: AuditOutcome::Failed,
                    }
                }
                AuditRunStatus::Retryable => {
                    tracing::debug!(
                        task = %artifact.task_id,
                        attempt = runs.len(),
                        max_attempts,
                        "audit retryable"
                    );
                }
            }
        }

        tracing::info!(task = %artifact.task_id, max_attempts, "audit retries exhausted");
        AuditTrail {
            runs,
            outcome: AuditOutcome::MaxRetriesExceeded,
        }
    }

    async fn run_attempt(&self, artifact: &Artifact, attempt: u32) -> AuditRun {
        let mut results = Vec::with_capacity(self.stages.len());

        for (i, stage) in self.stages.iter().enumerate() {
            let result = self.run_stage(i + 1, stage, artifact).await;
            let status = result.status;
            results.push(result);
            if status != StageStatus::Passed {
                break;
            }
        }

        let run = AuditRun::from_stages(attempt, results);
        tracing::debug!(
            task = %artifact.task_id,
            attempt,
            status = ?run.status,
            stages_run = run.stages.len(),
            "audit run finished"
        );
        run
    }

    async fn run_stage(
        &self,
        index: usize,
        stage: &Arc<dyn StageValidator>,
        artifact: &Artifact,
    ) -> AuditStageResult {
        let start = Instant::now();
        let stage_name = stage.name().to_string();

        // Validators run on their own task so a panic stays inside the stage.
        let validator = Arc::clone(stage);
        let owned = artifact.clone();
        let mut handle = tokio::spawn(async move { validator.validate(&owned).await });

        let verdict = match tokio::time::timeout(self.stage_timeout, &mut handle).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(join_err)) => {
                tracing::warn!(
                    task = %artifact.task_id,
                    stage = %stage_name,
                    error = %join_err,
                    "audit stage aborted"
                );
                StageVerdict::fail(vec![Violation::new(
                    Severity::Critical,
                    format!("stage aborted: {}", join_err),
                )])
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(
                    task = %artifact.task_id,
                    stage = %stage_name,
                    timeout_ms = self.stage_timeout.as_millis() as u64,
                    "audit stage timed out"
                );
                StageVerdict::retryable(vec![Violation::new(
                    Severity::Medium,
                    format!("stage timed out after {:?}", self.stage_timeout),
                )])
            }
        };

        AuditStageResult {
            stage_index: index,
            stage_name,
            status: verdict.status,
            violations: verdict.violations,
            duration: start.elapsed(),
        }
    }
}
