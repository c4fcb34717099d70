//! MECE partitioning of a task graph into dependency-ordered phases.
//!
//! Phases are the Kahn layers of the graph: every task appears in exactly
//! one phase (mutually exclusive, collectively exhaustive) and every
//! dependency of a task lives in a strictly earlier phase. Tasks inside a
//! phase are independent of each other and may run concurrently.

use crate::core::dag::TaskGraph;
use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default absolute degree a task must reach before it can be a bottleneck.
pub const DEFAULT_BOTTLENECK_MIN_DEGREE: usize = 5;

/// Default percentile of its peers' degrees a task must exceed to be a bottleneck.
pub const DEFAULT_BOTTLENECK_PERCENTILE: f64 = 0.9;

/// Thresholds for bottleneck detection.
///
/// Fan-in counts a task's dependencies and fan-out counts its dependents,
/// so a single task with many dependents is a fan-out bottleneck.
///
/// A task is flagged when, in either dimension, its degree is at least
/// `min_degree` and strictly greater than the nearest-rank `percentile` of
/// the other tasks' degrees. A graph where every task has the same degree
/// has no bottlenecks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BottleneckConfig {
    /// Absolute floor for the threshold.
    pub min_degree: usize,
    /// Percentile in (0, 1] of the degree distribution.
    pub percentile: f64,
}

impl Default for BottleneckConfig {
    fn default() -> Self {
        Self {
            min_degree: DEFAULT_BOTTLENECK_MIN_DEGREE,
            percentile: DEFAULT_BOTTLENECK_PERCENTILE,
        }
    }
}

impl BottleneckConfig {
    /// Create a config with the given absolute floor and the default percentile.
    pub fn with_min_degree(min_degree: usize) -> Self {
        Self {
            min_degree,
            ..Default::default()
        }
    }

    /// Check the percentile lies in (0, 1].
    pub fn validate(&self) -> Result<()> {
        if !(self.percentile > 0.0 && self.percentile <= 1.0) {
            return Err(Error::Config(format!(
                "bottleneck percentile must be in (0, 1], got {}",
                self.percentile
            )));
        }
        Ok(())
    }

    /// Check if `degree` stands out in a sorted distribution that includes it.
    fn exceeds(&self, degree: usize, sorted: &[usize]) -> bool {
        degree > 0
            && degree >= self.min_degree
            && degree > peer_rank(sorted, degree, self.percentile)
    }
}

/// Nearest-rank percentile of `sorted` with one occurrence of `own` left
/// out (0 when nothing remains).
fn peer_rank(sorted: &[usize], own: usize, percentile: f64) -> usize {
    let peers = sorted.len().saturating_sub(1);
    if peers == 0 {
        return 0;
    }
    let rank = (percentile * peers as f64).ceil() as usize;
    let k = rank.clamp(1, peers) - 1;
    let skipped = sorted.partition_point(|d| *d < own);
    if k < skipped {
        sorted[k]
    } else {
        sorted[k + 1]
    }
}

/// One dependency-ordered phase of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Position of the phase, starting at 0.
    pub index: usize,
    /// Tasks in the phase, sorted by identifier.
    pub tasks: Vec<TaskId>,
}

impl Phase {
    /// Number of tasks in the phase.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the phase has no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check if the phase contains a task.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains(id)
    }
}

/// A task with unusually many dependencies or dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bottleneck {
    /// The flagged task.
    pub task_id: TaskId,
    /// Number of dependencies.
    pub fan_in: usize,
    /// Number of dependents.
    pub fan_out: usize,
}

/// Output of partitioning: ordered phases plus bottleneck report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionResult {
    /// Phases in execution order.
    pub phases: Vec<Phase>,
    /// Tasks flagged as bottlenecks, sorted by identifier.
    pub bottlenecks: Vec<Bottleneck>,
}

impl PartitionResult {
    /// Index of the phase holding a task.
    pub fn phase_of(&self, id: &TaskId) -> Option<usize> {
        self.phases
            .iter()
            .find(|phase| phase.contains(id))
            .map(|phase| phase.index)
    }

    /// Total number of tasks across all phases.
    pub fn task_count(&self) -> usize {
        self.phases.iter().map(Phase::len).sum()
    }

    /// Check if a task was flagged as a bottleneck.
    pub fn is_bottleneck(&self, id: &TaskId) -> bool {
        self.bottlenecks.iter().any(|b| &b.task_id == id)
    }
}

/// Splits a task graph into MECE phases and reports bottlenecks.
#[derive(Debug, Clone, Default)]
pub struct MecePartitioner {
    config: BottleneckConfig,
}

impl MecePartitioner {
    /// Create a partitioner with the given bottleneck thresholds.
    pub fn new(config: BottleneckConfig) -> Self {
        Self { config }
    }

    /// Get the bottleneck thresholds.
    pub fn config(&self) -> &BottleneckConfig {
        &self.config
    }

    /// Build a graph from `tasks` and partition it.
    ///
    /// # Errors
    /// Propagates `Cycle`, `UnknownDependency`, `DuplicateTask` and
    /// `EmptyTaskId` from graph construction.
    pub fn partition<I>(&self, tasks: I) -> Result<PartitionResult>
    where
        I: IntoIterator<Item = Task>,
    {
        let graph = TaskGraph::from_tasks(tasks)?;
        self.partition_graph(&graph)
    }

    /// Partition an already built graph.
    pub fn partition_graph(&self, graph: &TaskGraph) -> Result<PartitionResult> {
        let phases: Vec<Phase> = graph
            .topological_layers()?
            .into_iter()
            .enumerate()
            .map(|(index, tasks)| Phase { index, tasks })
            .collect();

        let bottlenecks = self.bottlenecks(graph);

        tracing::debug!(
            phases = phases.len(),
            tasks = graph.task_count(),
            bottlenecks = bottlenecks.len(),
            "partitioned task graph"
        );

        Ok(PartitionResult {
            phases,
            bottlenecks,
        })
    }

    /// Flag tasks whose fan-in or fan-out stands out from the other tasks.
    pub fn bottlenecks(&self, graph: &TaskGraph) -> Vec<Bottleneck> {
        let degrees: HashMap<&TaskId, (usize, usize)> = graph
            .tasks()
            .into_iter()
            .map(|task| (&task.id, (graph.fan_in(&task.id), graph.fan_out(&task.id))))
            .collect();

        let mut fan_ins: Vec<usize> = degrees.values().map(|(fan_in, _)| *fan_in).collect();
        let mut fan_outs: Vec<usize> = degrees.values().map(|(_, fan_out)| *fan_out).collect();
        fan_ins.sort_unstable();
        fan_outs.sort_unstable();

        let mut flagged: Vec<Bottleneck> = degrees
            .into_iter()
            .filter(|(_, (fan_in, fan_out))| {
                self.config.exceeds(*fan_in, &fan_ins) || self.config.exceeds(*fan_out, &fan_outs)
            })
            .map(|(id, (fan_in, fan_out))| Bottleneck {
                task_id: id.clone(),
                fan_in,
                fan_out,
            })
            .collect();
        flagged.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        flagged
    }
}
