// src/report.rs

//! Final per-vertex outcome of a run.

use std::fmt;

use crate::dag::{RunStateTable, Workflow};
use crate::errors::ActionError;
use crate::types::{RunStatus, VertexState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexReport {
    pub id: String,
    pub is_group: bool,
    pub state: VertexState,
    /// Detail of the last failed attempt, for `Failed` tasks.
    pub error: Option<ActionError>,
    /// Attempts made; 0 for groups and tasks that never ran.
    pub attempts: u32,
}

/// Outcome of one run, vertices listed in topological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    pub workflow: String,
    pub tags: Vec<String>,
    pub status: RunStatus,
    pub vertices: Vec<VertexReport>,
}

impl RunReport {
    pub fn from_table(
        run_id: u64,
        workflow: &Workflow,
        table: &RunStateTable,
        cancelled: bool,
    ) -> Self {
        let graph = workflow.graph();
        let vertices: Vec<VertexReport> = graph
            .topological_order()
            .iter()
            .filter_map(|id| {
                let state = table.effective_state(graph, id)?;
                Some(VertexReport {
                    id: id.clone(),
                    is_group: graph.is_group(id),
                    state,
                    error: table.error_of(id).cloned(),
                    attempts: table.attempts_of(id),
                })
            })
            .collect();

        let status = if cancelled {
            RunStatus::Cancelled
        } else if vertices
            .iter()
            .any(|v| v.state.is_failure() || !v.state.is_terminal())
        {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };

        Self {
            run_id,
            workflow: workflow.name().to_string(),
            tags: workflow.tags().to_vec(),
            status,
            vertices,
        }
    }

    pub fn vertex(&self, id: &str) -> Option<&VertexReport> {
        self.vertices.iter().find(|v| v.id == id)
    }

    pub fn state_of(&self, id: &str) -> Option<VertexState> {
        self.vertex(id).map(|v| v.state)
    }

    pub fn error_of(&self, id: &str) -> Option<&ActionError> {
        self.vertex(id).and_then(|v| v.error.as_ref())
    }

    /// Ids of the vertices that ended in `state`.
    pub fn ids_in(&self, state: VertexState) -> Vec<&str> {
        self.vertices
            .iter()
            .filter(|v| v.state == state)
            .map(|v| v.id.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} of {}: {}", self.run_id, self.workflow, self.status)?;
        if !self.tags.is_empty() {
            write!(f, " [{}]", self.tags.join(", "))?;
        }
        writeln!(f)?;

        let width = self.vertices.iter().map(|v| v.id.len()).max().unwrap_or(0);
        for v in &self.vertices {
            let kind = if v.is_group { "group" } else { "task" };
            write!(f, "  {:<width$}  {:<5}  {}", v.id, kind, v.state)?;
            if v.attempts > 1 {
                write!(f, " ({} attempts)", v.attempts)?;
            }
            if let Some(err) = &v.error {
                write!(f, ": {err}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
