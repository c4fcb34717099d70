//! Core domain models for hive orchestration.
//!
//! This module contains the task model, the dependency DAG, the MECE
//! partitioner that turns the DAG into phases, and the artifacts agents
//! hand back.

pub mod artifact;
pub mod dag;
pub mod partition;
pub mod task;

pub use artifact::Artifact;
pub use dag::TaskGraph;
pub use partition::{Bottleneck, BottleneckConfig, MecePartitioner, PartitionResult, Phase};
pub use task::{Task, TaskId, TaskStatus};
