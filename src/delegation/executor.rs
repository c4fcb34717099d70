//! Agent-to-agent request execution.
//!
//! `A2aExecutor` dispatches a `DelegationRequest` to the handler registered
//! for its target agent and turns whatever happens into exactly one
//! `DelegationResponse`. Handlers run on their own tokio task so a timeout
//! can abort them; the executor itself never retries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Artifact, TaskId};
use crate::delegation::router::AgentId;
use crate::delegation::session::Session;
use crate::Result;

/// What a handler receives when invoked.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    /// The agent being invoked.
    pub agent: AgentId,
    /// The agent that delegated the work.
    pub requester: AgentId,
    pub task_id: TaskId,
    pub task_type: String,
    pub parameters: serde_json::Value,
    /// Session opened for this invocation.
    pub session: Arc<Session>,
}

/// An agent that can do delegated work.
///
/// `Ok(value)` becomes the artifact content; `Err` marks the delegation
/// Failed with the error's message.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Do the work described by `invocation`.
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<serde_json::Value>;
}

/// Handlers keyed by agent, with an optional catch-all.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<AgentId, Arc<dyn AgentHandler>>,
    fallback: Option<Arc<dyn AgentHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one agent.
    pub fn register(mut self, agent: AgentId, handler: Arc<dyn AgentHandler>) -> Self {
        self.handlers.insert(agent, handler);
        self
    }

    /// Handler used for agents without a dedicated registration.
    pub fn with_fallback(mut self, handler: Arc<dyn AgentHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Find the handler for `agent`, falling back to the catch-all.
    pub fn get(&self, agent: &AgentId) -> Option<Arc<dyn AgentHandler>> {
        self.handlers
            .get(agent)
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Number of dedicated registrations.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler at all is available.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty() && self.fallback.is_none()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut agents: Vec<String> = self.handlers.keys().map(|a| a.to_string()).collect();
        agents.sort();
        f.debug_struct("HandlerRegistry")
            .field("agents", &agents)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// A single delegation from `requester` to `target`.
#[derive(Debug, Clone)]
pub struct DelegationRequest {
    pub target: AgentId,
    pub requester: AgentId,
    pub task_id: TaskId,
    pub task_type: String,
    /// Free-form input handed to the handler.
    pub parameters: serde_json::Value,
    /// How long the handler may run before it is aborted.
    pub timeout: Duration,
    pub session: Arc<Session>,
}

/// How a delegation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    /// The handler returned a value.
    Completed,
    /// No handler, a handler error, or a handler panic.
    Failed,
    /// The handler did not answer within the request timeout.
    TimedOut,
}

impl std::fmt::Display for DelegationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelegationStatus::Completed => write!(f, "completed"),
            DelegationStatus::Failed => write!(f, "failed"),
            DelegationStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// The single answer to a `DelegationRequest`.
#[derive(Debug, Clone)]
pub struct DelegationResponse {
    pub task_id: TaskId,
    pub status: DelegationStatus,
    /// Present iff `status` is Completed.
    pub artifact: Option<Artifact>,
    /// Why the delegation did not complete.
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl DelegationResponse {
    fn completed(request: &DelegationRequest, content: serde_json::Value, elapsed: Duration) -> Self {
        Self {
            task_id: request.task_id.clone(),
            status: DelegationStatus::Completed,
            artifact: Some(Artifact::new(request.task_id.clone(), request.target, content)),
            error: None,
            elapsed,
        }
    }

    fn failed(request: &DelegationRequest, error: String, elapsed: Duration) -> Self {
        Self {
            task_id: request.task_id.clone(),
            status: DelegationStatus::Failed,
            artifact: None,
            error: Some(error),
            elapsed,
        }
    }

    fn timed_out(request: &DelegationRequest, elapsed: Duration) -> Self {
        Self {
            task_id: request.task_id.clone(),
            status: DelegationStatus::TimedOut,
            artifact: None,
            error: Some(format!("no response within {:?}", request.timeout)),
            elapsed,
        }
    }

    /// Check if the delegation produced an artifact.
    pub fn is_completed(&self) -> bool {
        self.status == DelegationStatus::Completed
    }
}

/// The A2aExecutor routes requests to handlers and enforces timeouts.
#[derive(Debug, Clone, Default)]
pub struct A2aExecutor {
    handlers: HandlerRegistry,
}

impl A2aExecutor {
    /// Create an executor over `handlers`.
    pub fn new(handlers: HandlerRegistry) -> Self {
        Self { handlers }
    }

    /// Get the handler registry.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Run one request to completion, failure, or timeout.
    pub async fn execute(&self, request: &DelegationRequest) -> DelegationResponse {
        let start = Instant::now();

        let Some(handler) = self.handlers.get(&request.target) else {
            tracing::warn!(target_agent = %request.target, task = %request.task_id, "no handler registered");
            return DelegationResponse::failed(
                request,
                format!("no handler registered for {}", request.target),
                start.elapsed(),
            );
        };

        let invocation = AgentInvocation {
            agent: request.target,
            requester: request.requester,
            task_id: request.task_id.clone(),
            task_type: request.task_type.clone(),
            parameters: request.parameters.clone(),
            session: Arc::clone(&request.session),
        };

        tracing::debug!(
            target_agent = %request.target,
            requester = %request.requester,
            task = %request.task_id,
            session = %request.session.id,
            "executing delegation"
        );

        let mut handle = tokio::spawn(async move { handler.invoke(&invocation).await });

        let response = match tokio::time::timeout(request.timeout, &mut handle).await {
            Ok(Ok(Ok(content))) => DelegationResponse::completed(request, content, start.elapsed()),
            Ok(Ok(Err(e))) => DelegationResponse::failed(request, e.to_string(), start.elapsed()),
            Ok(Err(join_err)) => DelegationResponse::failed(
                request,
                format!("handler aborted: {}", join_err),
                start.elapsed(),
            ),
            Err(_) => {
                handle.abort();
                DelegationResponse::timed_out(request, start.elapsed())
            }
        };

        tracing::debug!(
            task = %request.task_id,
            status = %response.status,
            elapsed_ms = response.elapsed.as_millis() as u64,
            "delegation finished"
        );
        response
    }
}
