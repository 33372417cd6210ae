// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::VertexId;
use crate::dag::scheduled::ScheduledTask;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the DAG and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks dispatched (now `Running`) as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks that ended `Failed` in this step, followed by the dependents
    /// that became `UpstreamFailed` because of it.
    pub newly_failed: Vec<VertexId>,
    /// Tasks moved to `Skipped` in this step.
    pub newly_skipped: Vec<VertexId>,
    /// Whether this step left every task in a terminal state.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|t| t.name.as_str()).collect()
    }
}
