//! Integration test suite for hive.
//!
//! These tests drive the public API end to end: partitioning, delegation,
//! audit retry and full orchestration runs with scripted agents.
//!
//! # Test Categories
//!
//! - `partitioning`: Phase layout, cycles and bottlenecks
//! - `delegation`: Routing, sessions and request execution
//! - `audit_retry`: Multi-stage audit with bounded retry
//! - `orchestration_e2e`: Full runs including halt and cascade behavior
//!
//! # CI Compatibility
//!
//! All agents are in-process fakes; nothing touches the network.

mod fixtures;

mod audit_retry;
mod delegation;
mod orchestration_e2e;
