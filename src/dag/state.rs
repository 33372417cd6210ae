// src/dag/state.rs

//! Per-run state table.
//!
//! Only task vertices carry stored state; a group's state is always derived
//! from its members and its own upstreams (see [`RunStateTable::effective_state`]). The table is
//! owned by exactly one [`Scheduler`](crate::dag::Scheduler), which is itself
//! driven from a single task, so every transition is applied atomically with
//! respect to readers of the table.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::dag::VertexId;
use crate::dag::graph::DependencyGraph;
use crate::errors::ActionError;
use crate::types::VertexState;

#[derive(Debug, Clone)]
pub struct RunStateTable {
    states: HashMap<VertexId, VertexState>,
    errors: HashMap<VertexId, ActionError>,
    attempts: HashMap<VertexId, u32>,
}

impl RunStateTable {
    /// Fresh table with every task vertex `Pending`.
    pub fn new(graph: &DependencyGraph) -> Self {
        let states = graph
            .tasks()
            .map(|id| (id.to_string(), VertexState::Pending))
            .collect();
        Self {
            states,
            errors: HashMap::new(),
            attempts: HashMap::new(),
        }
    }

    /// Stored state of a task vertex (`None` for groups and unknown ids).
    pub fn state_of(&self, id: &str) -> Option<VertexState> {
        self.states.get(id).copied()
    }

    /// State of any vertex; groups are aggregated from their members and
    /// their own effective upstreams.
    ///
    /// Group aggregation:
    /// - any member `Failed` → `Failed`
    /// - else any member `UpstreamFailed`, or any upstream failed →
    ///   `UpstreamFailed`
    /// - else members and upstreams all terminal → `Success` if every one of
    ///   them is `Success` (an empty group with no upstreams is vacuously
    ///   `Success`), otherwise `Skipped`
    /// - else any member `Queued`/`Running` → `Running`
    /// - else `Pending`
    pub fn effective_state(&self, graph: &DependencyGraph, id: &str) -> Option<VertexState> {
        if let Some(state) = self.state_of(id) {
            return Some(state);
        }
        if !graph.is_group(id) {
            return None;
        }

        let members: Vec<VertexState> = graph
            .members_of(id)
            .iter()
            .filter_map(|m| self.effective_state(graph, m))
            .collect();
        let upstreams: Vec<VertexState> = graph
            .upstreams_of(id)
            .iter()
            .filter_map(|up| self.effective_state(graph, up))
            .collect();

        let state = if members.contains(&VertexState::Failed) {
            VertexState::Failed
        } else if members.contains(&VertexState::UpstreamFailed)
            || upstreams.iter().any(|s| s.is_failure())
        {
            VertexState::UpstreamFailed
        } else if members.iter().chain(&upstreams).all(|s| s.is_terminal()) {
            if members
                .iter()
                .chain(&upstreams)
                .all(|s| *s == VertexState::Success)
            {
                VertexState::Success
            } else {
                VertexState::Skipped
            }
        } else if members
            .iter()
            .any(|s| matches!(s, VertexState::Queued | VertexState::Running))
        {
            VertexState::Running
        } else {
            VertexState::Pending
        };
        Some(state)
    }

    /// Whether upstream `id` currently lets its dependents start.
    ///
    /// Only `Success` does: `Skipped` exists only once the run is cancelled,
    /// and nothing is dispatched after that.
    pub fn is_satisfied(&self, graph: &DependencyGraph, id: &str) -> bool {
        self.effective_state(graph, id) == Some(VertexState::Success)
    }

    /// Apply a lifecycle transition to a task vertex.
    ///
    /// Illegal transitions (including any attempt to leave a terminal state)
    /// are refused and logged; returns whether the transition happened.
    pub fn transition(&mut self, id: &str, next: VertexState) -> bool {
        let Some(current) = self.states.get_mut(id) else {
            warn!(task = %id, to = %next, "transition for unknown task; ignoring");
            return false;
        };
        if !current.can_transition_to(next) {
            warn!(
                task = %id,
                from = %current,
                to = %next,
                "refusing illegal state transition"
            );
            return false;
        }
        debug!(task = %id, from = %current, to = %next, "state transition");
        *current = next;
        true
    }

    pub fn record_error(&mut self, id: &str, error: ActionError) {
        self.errors.insert(id.to_string(), error);
    }

    pub fn error_of(&self, id: &str) -> Option<&ActionError> {
        self.errors.get(id)
    }

    pub fn record_attempts(&mut self, id: &str, attempts: u32) {
        self.attempts.insert(id.to_string(), attempts);
    }

    pub fn attempts_of(&self, id: &str) -> u32 {
        self.attempts.get(id).copied().unwrap_or(0)
    }

    /// Mark every `Pending` vertex reachable from `failed` as
    /// `UpstreamFailed`.
    ///
    /// Traversal passes through groups (their state is derived) so that
    /// vertices gated on a group whose member failed are blocked too.
    /// Returns the newly blocked task ids.
    pub fn mark_dependents_upstream_failed(
        &mut self,
        graph: &DependencyGraph,
        failed: &str,
    ) -> Vec<VertexId> {
        let mut stack: Vec<VertexId> = graph.dependents_of(failed).to_vec();
        let mut visited: HashSet<VertexId> = HashSet::new();
        let mut newly_blocked = Vec::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            match self.state_of(&name) {
                Some(VertexState::Pending) => {
                    self.transition(&name, VertexState::UpstreamFailed);
                    debug!(
                        task = %name,
                        upstream = %failed,
                        "blocking dependent due to upstream failure"
                    );
                    newly_blocked.push(name.clone());
                    stack.extend(graph.dependents_of(&name).iter().cloned());
                }
                Some(_) => {
                    // Already dispatched or terminal; never revisited.
                }
                None => {
                    // Group: keep walking so its dependents see the failure.
                    stack.extend(graph.dependents_of(&name).iter().cloned());
                }
            }
        }

        newly_blocked
    }

    /// Move every `Pending`/`Queued` task to `Skipped`. Returns their ids.
    pub fn skip_unstarted(&mut self) -> Vec<VertexId> {
        let mut ids: Vec<VertexId> = self
            .states
            .iter()
            .filter(|(_, s)| matches!(s, VertexState::Pending | VertexState::Queued))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        for id in &ids {
            self.transition(id, VertexState::Skipped);
        }
        ids
    }

    /// Count of task vertices in `state`.
    pub fn count(&self, state: VertexState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// No task is `Pending`, `Queued` or `Running`.
    pub fn all_terminal(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }
}
