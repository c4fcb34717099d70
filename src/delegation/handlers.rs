//! Reference agent handlers.

use async_trait::async_trait;
use serde_json::json;

use crate::delegation::executor::{AgentHandler, AgentInvocation};
use crate::Result;

/// Returns the invocation itself as the artifact. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl AgentHandler for EchoHandler {
    async fn invoke(&self, invocation: &AgentInvocation) -> Result<serde_json::Value> {
        Ok(json!({
            "task_id": invocation.task_id,
            "task_type": invocation.task_type,
            "handled_by": invocation.agent.to_string(),
            "requested_by": invocation.requester.to_string(),
            "session": invocation.session.id,
            "parameters": invocation.parameters,
        }))
    }
}
