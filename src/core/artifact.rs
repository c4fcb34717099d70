//! Work artifacts produced by delegated agents.

use crate::core::task::TaskId;
use crate::delegation::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The opaque output of a delegation, handed to the audit pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// The task that produced this artifact.
    pub task_id: TaskId,
    /// The agent that produced it.
    pub produced_by: AgentId,
    /// Handler-defined payload.
    pub content: serde_json::Value,
    /// When the artifact was received.
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(task_id: TaskId, produced_by: AgentId, content: serde_json::Value) -> Self {
        Self {
            task_id,
            produced_by,
            content,
            created_at: Utc::now(),
        }
    }

    /// True for `null`, empty strings, arrays and objects.
    pub fn is_empty(&self) -> bool {
        match &self.content {
            serde_json::Value::Null => true,
            serde_json::Value::String(s) => s.trim().is_empty(),
            serde_json::Value::Array(items) => items.is_empty(),
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}
