//! Delegation sessions.
//!
//! Every delegation opens a session that scopes the request. Sessions form a
//! tree through their optional parent id (Queen → Princess → Drone), but the
//! registry stores them flat, keyed by id; the parent link is a plain
//! relation, never an owning reference.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delegation::router::AgentId;

/// Key/value payload attached to a session at creation.
pub type SessionContext = BTreeMap<String, serde_json::Value>;

/// Session identifier. Random v4 ids, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A delegation session. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// The agent that opened the session.
    pub requester: AgentId,
    pub parent: Option<SessionId>,
    pub context: SessionContext,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn context_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.context.get(key)
    }
}

/// Lock-protected arena of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(
        &self,
        requester: AgentId,
        parent: Option<SessionId>,
        context: SessionContext,
    ) -> Arc<Session> {
        let session = Arc::new(Session {
            id: SessionId::new(),
            requester,
            parent,
            context,
            created_at: Utc::now(),
        });
        self.sessions
            .write()
            .insert(session.id, Arc::clone(&session));
        tracing::debug!(
            session = %session.id,
            requester = %requester,
            parent = ?parent.map(|p| p.to_string()),
            "session created"
        );
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Live sessions whose parent is `id`, oldest first.
    pub fn children_of(&self, id: &SessionId) -> Vec<Arc<Session>> {
        let mut children: Vec<_> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.parent.as_ref() == Some(id))
            .cloned()
            .collect();
        children.sort_by_key(|s| s.created_at);
        children
    }

    /// Remove a single session. Children are left in place.
    pub fn release(&self, id: &SessionId) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Remove `root` and every descendant. Returns how many were removed.
    pub fn release_tree(&self, root: &SessionId) -> usize {
        let mut sessions = self.sessions.write();
        let mut stack = vec![*root];
        let mut released = 0;

        while let Some(id) = stack.pop() {
            if sessions.remove(&id).is_some() {
                released += 1;
            }
            stack.extend(
                sessions
                    .values()
                    .filter(|s| s.parent == Some(id))
                    .map(|s| s.id),
            );
        }

        if released > 0 {
            tracing::debug!(root = %root, released, "session tree released");
        }
        released
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
