//! Task DAG (Directed Acyclic Graph) for dependency management.
//!
//! `TaskGraph` stores tasks as nodes and "must pass before" relations as
//! edges pointing from a dependency to its dependent. Cycles are rejected at
//! insertion time, so every graph that exists is acyclic. Dependencies may
//! name tasks that have not been inserted yet; those edges are wired as soon
//! as the missing task arrives, and any that are still dangling when the
//! graph is laid out are reported as unknown.

use crate::core::task::{Task, TaskId};
use crate::error::{Error, Result};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

/// The task dependency graph.
pub struct TaskGraph {
    /// The underlying directed graph, edges run dependency -> dependent.
    graph: DiGraph<Task, ()>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    task_index: HashMap<TaskId, NodeIndex>,
    /// Dependencies named before being inserted, mapped to the tasks waiting on them.
    unresolved: BTreeMap<TaskId, Vec<TaskId>>,
}

impl TaskGraph {
    /// Create a new empty TaskGraph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_index: HashMap::new(),
            unresolved: BTreeMap::new(),
        }
    }

    /// Build a graph from a list of tasks, inserting them in order.
    ///
    /// # Errors
    /// Fails on the first cycle, duplicate or empty identifier, and on any
    /// dependency that never appears in the list.
    pub fn from_tasks<I>(tasks: I) -> Result<Self>
    where
        I: IntoIterator<Item = Task>,
    {
        let mut graph = Self::new();
        for task in tasks {
            graph.add_task(task)?;
        }
        graph.validate()?;
        Ok(graph)
    }

    /// Insert a task together with its dependency edges.
    ///
    /// Edges to dependencies already in the graph are added immediately;
    /// edges to dependencies not yet inserted are deferred. If the new edges
    /// (including deferred edges from tasks already waiting on this one)
    /// would close a cycle the graph is left unchanged.
    ///
    /// # Errors
    /// - `EmptyTaskId` for a blank identifier
    /// - `DuplicateTask` if the identifier is already present
    /// - `Cycle` if insertion would create a dependency cycle
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if task.id.is_empty() {
            return Err(Error::EmptyTaskId);
        }
        if self.task_index.contains_key(&task.id) {
            return Err(Error::DuplicateTask(task.id));
        }

        let id = task.id.clone();
        let deps = task.unique_dependencies();

        if deps.contains(&id) {
            return Err(Error::Cycle {
                from: id.clone(),
                to: id,
            });
        }

        let waiters = self.unresolved.get(&id).cloned().unwrap_or_default();

        // Any new cycle must run new -> waiter ~> dependency -> new.
        for dep in &deps {
            let Some(&dep_index) = self.task_index.get(dep) else {
                continue;
            };
            for waiter in &waiters {
                let Some(&waiter_index) = self.task_index.get(waiter) else {
                    continue;
                };
                if waiter_index == dep_index
                    || has_path_connecting(&self.graph, waiter_index, dep_index, None)
                {
                    return Err(Error::Cycle {
                        from: dep.clone(),
                        to: id,
                    });
                }
            }
        }

        let index = self.graph.add_node(task);
        self.task_index.insert(id.clone(), index);

        for dep in deps {
            match self.task_index.get(&dep) {
                Some(&dep_index) => {
                    self.graph.add_edge(dep_index, index, ());
                }
                None => self.unresolved.entry(dep).or_default().push(id.clone()),
            }
        }

        if let Some(waiters) = self.unresolved.remove(&id) {
            for waiter in waiters {
                if let Some(&waiter_index) = self.task_index.get(&waiter) {
                    self.graph.add_edge(index, waiter_index, ());
                }
            }
        }

        Ok(())
    }

    /// Check that every named dependency has been inserted.
    pub fn validate(&self) -> Result<()> {
        match self.unresolved.iter().next() {
            Some((dependency, waiters)) => Err(Error::UnknownDependency {
                task: waiters.first().cloned().unwrap_or_else(|| dependency.clone()),
                dependency: dependency.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Dependencies that were named but never inserted, with the tasks waiting on them.
    pub fn unresolved_dependencies(&self) -> &BTreeMap<TaskId, Vec<TaskId>> {
        &self.unresolved
    }

    /// Layer the graph with Kahn's algorithm.
    ///
    /// Each layer holds every task whose dependencies all sit in earlier
    /// layers, so the layering has minimal height. Tasks within a layer are
    /// sorted by identifier ascending.
    ///
    /// # Errors
    /// Returns `UnknownDependency` if a dependency was never inserted.
    pub fn topological_layers(&self) -> Result<Vec<Vec<TaskId>>> {
        self.validate()?;

        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| {
                let degree = self
                    .graph
                    .neighbors_directed(index, Direction::Incoming)
                    .count();
                (index, degree)
            })
            .collect();

        let mut current: Vec<NodeIndex> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&index, _)| index)
            .collect();

        let mut layers = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            current.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));

            let mut next = Vec::new();
            for &index in &current {
                for successor in self.graph.neighbors_directed(index, Direction::Outgoing) {
                    if let Some(degree) = in_degree.get_mut(&successor) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(successor);
                        }
                    }
                }
            }

            placed += current.len();
            layers.push(current.iter().map(|&i| self.graph[i].id.clone()).collect());
            current = next;
        }

        if placed != self.graph.node_count() {
            return Err(Error::Validation(format!(
                "{} tasks could not be layered",
                self.graph.node_count() - placed
            )));
        }

        Ok(layers)
    }

    /// Get a reference to a task by its ID.
    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.task_index
            .get(id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get a mutable reference to a task by its ID.
    pub fn get_task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        match self.task_index.get(id) {
            Some(&index) => self.graph.node_weight_mut(index),
            None => None,
        }
    }

    /// Tasks that the given task depends on, in declaration order.
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<TaskId> {
        self.get_task(id)
            .map(|task| task.unique_dependencies())
            .unwrap_or_default()
    }

    /// Tasks that depend on the given task, sorted by identifier.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<TaskId> {
        let mut dependents: Vec<TaskId> = match self.task_index.get(id) {
            Some(&index) => self
                .graph
                .neighbors_directed(index, Direction::Outgoing)
                .map(|n| self.graph[n].id.clone())
                .collect(),
            None => Vec::new(),
        };
        dependents.sort();
        dependents
    }

    /// Number of inserted dependencies of a task (incoming edges).
    pub fn fan_in(&self, id: &TaskId) -> usize {
        self.degree(id, Direction::Incoming)
    }

    /// Number of tasks depending on a task (outgoing edges).
    pub fn fan_out(&self, id: &TaskId) -> usize {
        self.degree(id, Direction::Outgoing)
    }

    fn degree(&self, id: &TaskId, direction: Direction) -> usize {
        self.task_index
            .get(id)
            .map(|&index| self.graph.neighbors_directed(index, direction).count())
            .unwrap_or(0)
    }

    /// Check if a dependency edge exists between two tasks.
    pub fn has_dependency(&self, dependency: &TaskId, dependent: &TaskId) -> bool {
        match (self.task_index.get(dependency), self.task_index.get(dependent)) {
            (Some(&from), Some(&to)) => self.graph.find_edge(from, to).is_some(),
            _ => false,
        }
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> Vec<&Task> {
        self.graph.node_weights().collect()
    }

    /// Get the number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependency edges in the graph.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the graph contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .field("unresolved", &self.unresolved.len())
            .finish()
    }
}
