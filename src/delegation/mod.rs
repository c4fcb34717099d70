//! Queen → Princess → Drone delegation.
//!
//! Routing picks the agents, sessions scope each request, and the executor
//! runs the request against a registered handler.

pub mod executor;
pub mod handlers;
pub mod router;
pub mod session;

pub use executor::{
    A2aExecutor, AgentHandler, AgentInvocation, DelegationRequest, DelegationResponse,
    DelegationStatus, HandlerRegistry,
};
pub use handlers::EchoHandler;
pub use router::{AgentId, DelegationRouter, DroneId, PrincessId, Route};
pub use session::{Session, SessionContext, SessionId, SessionRegistry};
