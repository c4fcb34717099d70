//! Audit results: violations, per-stage results, runs and trails.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How serious a violation is, ordered from Low to Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A problem a stage found in an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub description: String,
    /// Where in the artifact the problem is, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Violation {
    /// Create a violation without a location.
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
            location: None,
        }
    }

    /// Attach a location.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Passed,
    /// Fails the run; retrying would not help.
    Failed,
    /// Ends the run, but the artifact may pass on another attempt.
    FailedRetryable,
}

/// What a validator returns. The pipeline adds index, name and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageVerdict {
    pub status: StageStatus,
    pub violations: Vec<Violation>,
}

impl StageVerdict {
    /// A passing verdict with no violations.
    pub fn pass() -> Self {
        Self {
            status: StageStatus::Passed,
            violations: Vec::new(),
        }
    }

    /// A terminal failure.
    pub fn fail(violations: Vec<Violation>) -> Self {
        Self {
            status: StageStatus::Failed,
            violations,
        }
    }

    /// A failure that a later attempt may clear.
    pub fn retryable(violations: Vec<Violation>) -> Self {
        Self {
            status: StageStatus::FailedRetryable,
            violations,
        }
    }
}

/// A verdict placed in the pipeline, with timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStageResult {
    /// 1-based position in the pipeline.
    pub stage_index: usize,
    pub stage_name: String,
    pub status: StageStatus,
    pub violations: Vec<Violation>,
    pub duration: Duration,
}

/// Outcome of a single run, taken from the stage that ended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRunStatus {
    Passed,
    Failed,
    /// Ended by a `FailedRetryable` stage.
    Retryable,
}

/// One pass of an artifact through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRun {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Results of the stages that ran, in order. Stages after the first
    /// failure are absent.
    pub stages: Vec<AuditStageResult>,
    pub status: AuditRunStatus,
}

impl AuditRun {
    /// Derive the run status from its stage results.
    pub fn from_stages(attempt: u32, stages: Vec<AuditStageResult>) -> Self {
        let status = match stages.iter().rev().find(|s| s.status != StageStatus::Passed) {
            None => AuditRunStatus::Passed,
            Some(s) if s.status == StageStatus::FailedRetryable => AuditRunStatus::Retryable,
            Some(_) => AuditRunStatus::Failed,
        };
        Self {
            attempt,
            stages,
            status,
        }
    }

    /// Check if every stage passed.
    pub fn passed(&self) -> bool {
        self.status == AuditRunStatus::Passed
    }

    /// Violations from every stage that ran.
    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.stages.iter().flat_map(|s| s.violations.iter())
    }

    /// The stage that ended the run, if it did not pass.
    pub fn failing_stage(&self) -> Option<&AuditStageResult> {
        self.stages.iter().find(|s| s.status != StageStatus::Passed)
    }
}

/// Final verdict after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Passed,
    Failed,
    /// Every allowed attempt ended retryable.
    MaxRetriesExceeded,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOutcome::Passed => write!(f, "passed"),
            AuditOutcome::Failed => write!(f, "failed"),
            AuditOutcome::MaxRetriesExceeded => write!(f, "max_retries_exceeded"),
        }
    }
}

/// Every run of an artifact and the final verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub runs: Vec<AuditRun>,
    pub outcome: AuditOutcome,
}

impl AuditTrail {
    /// Number of runs made.
    pub fn attempts(&self) -> u32 {
        self.runs.len() as u32
    }

    /// The final run, if any run was made.
    pub fn last_run(&self) -> Option<&AuditRun> {
        self.runs.last()
    }

    /// Violations from the final run.
    pub fn terminal_violations(&self) -> Vec<Violation> {
        self.last_run()
            .map(|run| run.violations().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if the artifact was accepted.
    pub fn passed(&self) -> bool {
        self.outcome == AuditOutcome::Passed
    }
}
