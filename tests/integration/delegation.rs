//! Delegation tests: routing, session trees and request execution.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use hive::core::TaskId;
use hive::delegation::{
    A2aExecutor, AgentId, DelegationRequest, DelegationRouter, DelegationStatus, DroneId,
    HandlerRegistry, PrincessId, SessionContext,
};

use crate::fixtures::{NeverReturns, RecordingHandler};

fn request(router: &DelegationRouter, task: &str, task_type: &str, timeout: Duration) -> DelegationRequest {
    let route = router.route(task_type);
    let session = router.create_session(
        AgentId::Princess(route.princess),
        None,
        SessionContext::new(),
    );
    DelegationRequest {
        target: AgentId::Drone(route.drone),
        requester: AgentId::Princess(route.princess),
        task_id: TaskId::from(task),
        task_type: task_type.to_string(),
        parameters: json!({"description": task}),
        timeout,
        session,
    }
}

#[tokio::test]
async fn test_handler_that_never_returns_times_out() {
    let router = DelegationRouter::new();
    let executor = A2aExecutor::new(HandlerRegistry::new().with_fallback(Arc::new(NeverReturns)));

    let response = executor
        .execute(&request(&router, "api", "backend", Duration::from_millis(100)))
        .await;

    assert_eq!(response.status, DelegationStatus::TimedOut);
    assert!(response.artifact.is_none());
    assert!(response.elapsed >= Duration::from_millis(100));
    assert!(response.elapsed < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_request_reaches_routed_drone() {
    let router = DelegationRouter::new();
    let tester = Arc::new(RecordingHandler::new());
    let handlers = HandlerRegistry::new().register(AgentId::Drone(DroneId::Tester), tester.clone());
    let executor = A2aExecutor::new(handlers);

    let response = executor
        .execute(&request(&router, "suite", "testing", Duration::from_secs(1)))
        .await;
    assert_eq!(response.status, DelegationStatus::Completed);
    assert_eq!(tester.invoked(), vec![TaskId::from("suite")]);

    // backend work routes to a development drone that has no handler
    let response = executor
        .execute(&request(&router, "api", "backend", Duration::from_secs(1)))
        .await;
    assert_eq!(response.status, DelegationStatus::Failed);
    assert!(!tester.was_invoked("api"));
}

#[test]
fn test_routing_table_examples() {
    let router = DelegationRouter::new();
    let cases = [
        ("backend", PrincessId::Development, DroneId::BackendDev),
        ("frontend", PrincessId::Development, DroneId::FrontendDev),
        ("review", PrincessId::Quality, DroneId::Reviewer),
        ("architecture", PrincessId::Coordination, DroneId::Architect),
        ("cloud", PrincessId::Infrastructure, DroneId::CloudArchitect),
        ("general", PrincessId::Generic, DroneId::Generalist),
    ];
    for (task_type, princess, drone) in cases {
        let route = router.route(task_type);
        assert_eq!(route.princess, princess, "{}", task_type);
        assert_eq!(route.drone, drone, "{}", task_type);
    }
}

#[test]
fn test_session_tree_release() {
    let router = DelegationRouter::new();
    let root = router.create_session(AgentId::Queen, None, SessionContext::new());
    let princess = router.create_session(
        AgentId::Princess(PrincessId::Quality),
        Some(root.id),
        SessionContext::new(),
    );
    for _ in 0..3 {
        router.create_session(
            AgentId::Drone(DroneId::Tester),
            Some(princess.id),
            SessionContext::new(),
        );
    }

    let sessions = router.sessions();
    assert_eq!(sessions.len(), 5);
    assert_eq!(sessions.children_of(&princess.id).len(), 3);
    assert_eq!(sessions.release_tree(&root.id), 5);
    assert!(sessions.is_empty());
}
