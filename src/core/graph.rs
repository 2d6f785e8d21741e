//! Dependency graph resolution for an epic's children.
//!
//! Only edges between two children of the same epic count. A dependency on
//! a task outside the epic is ignored: the scheduler cannot observe it, so
//! it must not be able to block anything.

use crate::core::task::{ChildStatus, ChildTask, TaskId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Recompute `Ready`/`Blocked` for every child that is neither completed nor
/// in progress.
///
/// A child is blocked iff one of its in-epic dependencies is not completed.
/// An unblocked child claimed elsewhere moves to `InProgress` instead of
/// `Ready`.
/// Idempotent; safe to call after every mutation.
///
/// # Returns
/// Ids of children that moved into `Ready` from `Blocked` or `Pending` during
/// this call, in input order.
pub fn resolve(children: &mut [ChildTask]) -> Vec<TaskId> {
    let statuses: HashMap<TaskId, ChildStatus> = children
        .iter()
        .map(|c| (c.id.clone(), c.status))
        .collect();

    let mut newly_ready = Vec::new();
    for child in children.iter_mut() {
        if child.is_settled() {
            continue;
        }

        let blocked = child.depends_on.iter().any(|dep| {
            statuses
                .get(dep)
                .is_some_and(|status| *status != ChildStatus::Completed)
        });

        let next = if blocked {
            ChildStatus::Blocked
        } else if child.claimed_elsewhere {
            ChildStatus::InProgress
        } else {
            ChildStatus::Ready
        };
        if next == ChildStatus::Ready && child.status != ChildStatus::Ready {
            newly_ready.push(child.id.clone());
        }
        child.status = next;
    }
    newly_ready
}

/// In-epic dependency edges as a petgraph digraph (dependency -> dependent).
pub struct EpicGraph {
    graph: DiGraph<TaskId, ()>,
}

impl EpicGraph {
    pub fn build(children: &[ChildTask]) -> Self {
        let mut graph = DiGraph::new();
        let mut index: HashMap<TaskId, NodeIndex> = HashMap::new();
        for child in children {
            if !index.contains_key(&child.id) {
                let node = graph.add_node(child.id.clone());
                index.insert(child.id.clone(), node);
            }
        }

        for child in children {
            let to = index[&child.id];
            let mut seen = HashSet::new();
            for dep in &child.depends_on {
                if let Some(&from) = index.get(dep) {
                    if seen.insert(from) {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        Self { graph }
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges that stay inside the epic.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Groups of children that depend on each other in a loop. Such tasks
    /// can never become ready.
    ///
    /// Each group is sorted by id; groups are sorted by their first member.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut groups: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.find_edge(scc[0], scc[0]).is_some()
            })
            .map(|scc| {
                let mut ids: Vec<TaskId> = scc
                    .into_iter()
                    .filter_map(|n| self.graph.node_weight(n).cloned())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        groups.sort();
        groups
    }
}

impl std::fmt::Debug for EpicGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpicGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
