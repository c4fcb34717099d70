//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Scripted agent handlers that record what they were asked to do
//! - Scripted audit stages with per-attempt verdicts
//! - Predefined task sets

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use hive::audit::{Severity, StageStatus, StageValidator, StageVerdict, Violation};
use hive::core::{Artifact, Task, TaskId};
use hive::delegation::{AgentHandler, AgentInvocation, EchoHandler};
use hive::{Error, Result};

/// Handler that records every invocation and fails for selected tasks.
#[derive(Default)]
pub struct RecordingHandler {
    invoked: Mutex<Vec<TaskId>>,
    failing: HashSet<TaskId>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make invocations for `id` return an error.
    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(TaskId::from(id));
        self
    }

    /// Task ids in invocation order.
    pub fn invoked(&self) -> Vec<TaskId> {
        self.invoked.lock().clone()
    }

    pub fn was_invoked(&self, id: &str) -> bool {
        self.invoked.lock().iter().any(|t| t.as_str() == id)
    }
}

#[async_trait]
impl AgentHandler for RecordingHandler {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<serde_json::Value> {
        self.invoked.lock().push(invocation.task_id.clone());
        if self.failing.contains(&invocation.task_id) {
            return Err(Error::Handler(format!("{} failed", invocation.task_id)));
        }
        EchoHandler.invoke(invocation).await
    }
}

/// Handler that never answers.
pub struct NeverReturns;

#[async_trait]
impl AgentHandler for NeverReturns {
    async fn invoke(&self, _invocation: &AgentInvocation) -> Result<serde_json::Value> {
        std::future::pending::<()>().await;
        Ok(serde_json::Value::Null)
    }
}

/// Handler that tracks how many invocations overlap.
#[derive(Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentHandler for ConcurrencyGauge {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<serde_json::Value> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        EchoHandler.invoke(invocation).await
    }
}

/// Audit stage that returns a scripted status per attempt. The last entry
/// repeats once the script runs out.
pub struct ScriptedStage {
    name: String,
    script: Vec<StageStatus>,
    calls: AtomicUsize,
}

impl ScriptedStage {
    pub fn new(name: &str, script: &[StageStatus]) -> Self {
        Self {
            name: name.to_string(),
            script: script.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(name: &str, status: StageStatus) -> Self {
        Self::new(name, &[status])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageValidator for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, _artifact: &Artifact) -> StageVerdict {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .script
            .get(call)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or(StageStatus::Passed);
        let violation = || vec![Violation::new(Severity::Medium, format!("{} rejected", self.name))];
        match status {
            StageStatus::Passed => StageVerdict::pass(),
            StageStatus::Failed => StageVerdict::fail(violation()),
            StageStatus::FailedRetryable => StageVerdict::retryable(violation()),
        }
    }
}

/// Audit stage whose validator panics.
pub struct PanickingStage;

#[async_trait]
impl StageValidator for PanickingStage {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn validate(&self, artifact: &Artifact) -> StageVerdict {
        panic!("validator crashed on {}", artifact.task_id)
    }
}

pub fn stages(stages: Vec<Arc<ScriptedStage>>) -> Vec<Arc<dyn StageValidator>> {
    stages
        .into_iter()
        .map(|s| s as Arc<dyn StageValidator>)
        .collect()
}

/// A with two dependents, B and C.
pub fn fan_out_tasks() -> Vec<Task> {
    vec![
        Task::new("A", "Design schema", "architecture"),
        Task::new("B", "Build API", "backend").with_dependencies(["A"]),
        Task::new("C", "Build UI", "frontend").with_dependencies(["A"]),
    ]
}

/// Two-phase plan: `setup` first, then three independent tasks on top.
pub fn two_phase_tasks() -> Vec<Task> {
    vec![
        Task::new("setup", "Provision infrastructure", "devops"),
        Task::new("api", "Build API", "backend").with_dependencies(["setup"]),
        Task::new("ui", "Build UI", "frontend").with_dependencies(["setup"]),
        Task::new("docs", "Write docs", "documentation").with_dependencies(["setup"]),
    ]
}

/// `width` independent tasks per layer, each depending on every task in the
/// layer below.
pub fn layered_tasks(width: usize, depth: usize) -> Vec<Task> {
    let name = |layer: usize, i: usize| format!("l{}-t{}", layer, i);
    let mut tasks = Vec::new();
    for layer in 0..depth {
        for i in 0..width {
            let deps: Vec<String> = if layer == 0 {
                Vec::new()
            } else {
                (0..width).map(|j| name(layer - 1, j)).collect()
            };
            tasks.push(Task::new(name(layer, i), "", "general").with_dependencies(deps));
        }
    }
    tasks
}
