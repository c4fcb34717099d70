//! Two-tier routing from task types to coordinators and workers.
//!
//! The Queen hands every task to a Princess coordinator chosen from the
//! task's `agent_type`, and the Princess picks one of its Drones. Both
//! lookups are pure table lookups so the same task type always lands on the
//! same agent pair.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::delegation::session::{Session, SessionContext, SessionId, SessionRegistry};

/// Mid-tier coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincessId {
    Development,
    Quality,
    Coordination,
    Infrastructure,
    /// Catch-all for task types no coordinator claims.
    Generic,
}

impl PrincessId {
    /// Every coordinator, in routing-table order.
    pub const ALL: [PrincessId; 5] = [
        PrincessId::Development,
        PrincessId::Quality,
        PrincessId::Coordination,
        PrincessId::Infrastructure,
        PrincessId::Generic,
    ];

    /// Stable name used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincessId::Development => "development-princess",
            PrincessId::Quality => "quality-princess",
            PrincessId::Coordination => "coordination-princess",
            PrincessId::Infrastructure => "infrastructure-princess",
            PrincessId::Generic => "generic-princess",
        }
    }

    /// The drone used when no task type in this coordinator's table matches.
    pub fn default_drone(&self) -> DroneId {
        match self {
            PrincessId::Development => DroneId::Coder,
            PrincessId::Quality => DroneId::Tester,
            PrincessId::Coordination => DroneId::Researcher,
            PrincessId::Infrastructure => DroneId::DevopsEngineer,
            PrincessId::Generic => DroneId::Generalist,
        }
    }

    fn drone_table(&self) -> &'static [(&'static str, DroneId)] {
        match self {
            PrincessId::Development => DEVELOPMENT_DRONES,
            PrincessId::Quality => QUALITY_DRONES,
            PrincessId::Coordination => COORDINATION_DRONES,
            PrincessId::Infrastructure => INFRASTRUCTURE_DRONES,
            PrincessId::Generic => &[],
        }
    }
}

impl std::fmt::Display for PrincessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Leaf workers that produce artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneId {
    Coder,
    BackendDev,
    FrontendDev,
    DatabaseArchitect,
    Tester,
    Reviewer,
    SecurityAuditor,
    PerformanceAnalyst,
    Researcher,
    Planner,
    Architect,
    Documenter,
    DevopsEngineer,
    DeploymentManager,
    CicdEngineer,
    CloudArchitect,
    Generalist,
}

impl DroneId {
    /// Stable name used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DroneId::Coder => "coder",
            DroneId::BackendDev => "backend-dev",
            DroneId::FrontendDev => "frontend-dev",
            DroneId::DatabaseArchitect => "database-architect",
            DroneId::Tester => "tester",
            DroneId::Reviewer => "reviewer",
            DroneId::SecurityAuditor => "security-auditor",
            DroneId::PerformanceAnalyst => "performance-analyst",
            DroneId::Researcher => "researcher",
            DroneId::Planner => "planner",
            DroneId::Architect => "architect",
            DroneId::Documenter => "documenter",
            DroneId::DevopsEngineer => "devops-engineer",
            DroneId::DeploymentManager => "deployment-manager",
            DroneId::CicdEngineer => "cicd-engineer",
            DroneId::CloudArchitect => "cloud-architect",
            DroneId::Generalist => "generalist",
        }
    }
}

impl std::fmt::Display for DroneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Any participant in a delegation: the Queen, a Princess, or a Drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tier", content = "id", rename_all = "snake_case")]
pub enum AgentId {
    Queen,
    Princess(PrincessId),
    Drone(DroneId),
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentId::Queen => write!(f, "queen"),
            AgentId::Princess(p) => write!(f, "princess:{}", p),
            AgentId::Drone(d) => write!(f, "drone:{}", d),
        }
    }
}

const PRINCESS_TABLE: &[(&str, PrincessId)] = &[
    ("development", PrincessId::Development),
    ("coding", PrincessId::Development),
    ("implementation", PrincessId::Development),
    ("backend", PrincessId::Development),
    ("frontend", PrincessId::Development),
    ("database", PrincessId::Development),
    ("api", PrincessId::Development),
    ("quality", PrincessId::Quality),
    ("testing", PrincessId::Quality),
    ("test", PrincessId::Quality),
    ("review", PrincessId::Quality),
    ("security", PrincessId::Quality),
    ("performance", PrincessId::Quality),
    ("research", PrincessId::Coordination),
    ("analysis", PrincessId::Coordination),
    ("planning", PrincessId::Coordination),
    ("architecture", PrincessId::Coordination),
    ("design", PrincessId::Coordination),
    ("documentation", PrincessId::Coordination),
    ("docs", PrincessId::Coordination),
    ("infrastructure", PrincessId::Infrastructure),
    ("devops", PrincessId::Infrastructure),
    ("deployment", PrincessId::Infrastructure),
    ("ci", PrincessId::Infrastructure),
    ("cicd", PrincessId::Infrastructure),
    ("cloud", PrincessId::Infrastructure),
];

const DEVELOPMENT_DRONES: &[(&str, DroneId)] = &[
    ("backend", DroneId::BackendDev),
    ("api", DroneId::BackendDev),
    ("frontend", DroneId::FrontendDev),
    ("database", DroneId::DatabaseArchitect),
];

const QUALITY_DRONES: &[(&str, DroneId)] = &[
    ("testing", DroneId::Tester),
    ("test", DroneId::Tester),
    ("review", DroneId::Reviewer),
    ("security", DroneId::SecurityAuditor),
    ("performance", DroneId::PerformanceAnalyst),
];

const COORDINATION_DRONES: &[(&str, DroneId)] = &[
    ("research", DroneId::Researcher),
    ("analysis", DroneId::Researcher),
    ("planning", DroneId::Planner),
    ("architecture", DroneId::Architect),
    ("design", DroneId::Architect),
    ("documentation", DroneId::Documenter),
    ("docs", DroneId::Documenter),
];

const INFRASTRUCTURE_DRONES: &[(&str, DroneId)] = &[
    ("deployment", DroneId::DeploymentManager),
    ("ci", DroneId::CicdEngineer),
    ("cicd", DroneId::CicdEngineer),
    ("cloud", DroneId::CloudArchitect),
];

fn normalize(task_type: &str) -> String {
    task_type.trim().to_ascii_lowercase()
}

fn lookup<T: Copy>(table: &[(&str, T)], task_type: &str) -> Option<T> {
    let key = normalize(task_type);
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

/// Result of routing one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub princess: PrincessId,
    pub drone: DroneId,
}

/// Routes task types to agents and opens the sessions that scope each
/// delegation.
#[derive(Debug, Clone, Default)]
pub struct DelegationRouter {
    sessions: Arc<SessionRegistry>,
}

impl DelegationRouter {
    /// Create a router with its own session registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing registry, e.g. one also held by the orchestrator.
    pub fn with_sessions(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// Get the session registry.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Pick the coordinator for a task type. Unknown types go to `Generic`.
    pub fn resolve_princess(&self, task_type: &str) -> PrincessId {
        lookup(PRINCESS_TABLE, task_type).unwrap_or(PrincessId::Generic)
    }

    /// Pick a drone from `princess`'s table, or its default drone.
    pub fn resolve_drone(&self, princess: PrincessId, task_type: &str) -> DroneId {
        lookup(princess.drone_table(), task_type).unwrap_or_else(|| princess.default_drone())
    }

    /// Resolve both the coordinator and the drone for a task type.
    pub fn route(&self, task_type: &str) -> Route {
        let princess = self.resolve_princess(task_type);
        Route {
            princess,
            drone: self.resolve_drone(princess, task_type),
        }
    }

    /// Open a session for `requester`, nested under `parent` when given.
    pub fn create_session(
        &self,
        requester: AgentId,
        parent: Option<SessionId>,
        context: SessionContext,
    ) -> Arc<Session> {
        self.sessions.create_session(requester, parent, context)
    }
}

/// Registered `(task type, drone)` pairs per coordinator, for `hive plan`
/// style listings.
pub fn routing_table() -> HashMap<PrincessId, Vec<(&'static str, DroneId)>> {
    PrincessId::ALL
        .iter()
        .map(|p| (*p, p.drone_table().to_vec()))
        .collect()
}
