// src/dag/workflow.rs

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::dag::graph::{DependencyGraph, VertexKind};
use crate::dag::node::TaskNode;
use crate::dag::VertexId;

/// A validated, immutable workflow definition.
///
/// Produced by [`WorkflowBuilder::build`](crate::dag::WorkflowBuilder::build);
/// runs share it read-only through an `Arc`.
#[derive(Debug)]
pub struct Workflow {
    pub(crate) name: String,
    pub(crate) tags: Vec<String>,
    pub(crate) graph: DependencyGraph,
    pub(crate) tasks: HashMap<VertexId, Arc<TaskNode>>,
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn task(&self, id: &str) -> Option<&Arc<TaskNode>> {
        self.tasks.get(id)
    }

    /// Human readable listing in topological order, used for `--dry-run`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "workflow {}", self.name);
        if !self.tags.is_empty() {
            let _ = writeln!(out, "  tags: {}", self.tags.join(", "));
        }
        let _ = writeln!(out);

        for id in self.graph.topological_order() {
            match self.graph.kind_of(id) {
                Some(VertexKind::Group { members }) => {
                    let _ = writeln!(out, "  - {id} (group, {} members)", members.len());
                }
                _ => {
                    let label = self
                        .tasks
                        .get(id)
                        .map(|t| t.action.describe())
                        .unwrap_or_default();
                    let _ = writeln!(out, "  - {id} [{label}]");
                    if let Some(task) = self.tasks.get(id) {
                        if let Some(timeout) = task.timeout {
                            let _ = writeln!(out, "      timeout: {timeout:?}");
                        }
                        if let Some(retries) = task.retries.filter(|r| *r > 0) {
                            let _ = writeln!(out, "      retries: {retries}");
                        }
                    }
                }
            }
            let ups: Vec<&str> = self.graph.declared_upstreams_of(id).collect();
            if !ups.is_empty() {
                let _ = writeln!(out, "      after: {ups:?}");
            }
            if let Some(parent) = self.graph.parent_of(id) {
                let _ = writeln!(out, "      in group: {parent}");
            }
        }
        out
    }
}
