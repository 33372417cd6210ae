// src/dag/scheduled.rs

use std::sync::Arc;
use std::time::Duration;

use crate::dag::VertexId;
use crate::dag::node::TaskNode;
use crate::exec::TaskAction;

/// A task the scheduler wants the executor to run now.
///
/// The vertex is already `Running` in the state table by the time this is
/// handed out.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: VertexId,
    pub node: Arc<TaskNode>,
    /// All tasks dispatched within one run share the same `run_id`.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn new(node: Arc<TaskNode>, run_id: u64) -> Self {
        Self {
            name: node.id.clone(),
            node,
            run_id,
        }
    }

    pub fn action(&self) -> Arc<dyn TaskAction> {
        Arc::clone(&self.node.action)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.node.timeout
    }

    pub fn retries(&self) -> u32 {
        self.node.retries.unwrap_or(0)
    }

    pub fn retry_delay(&self) -> Duration {
        self.node.retry_delay.unwrap_or_default()
    }
}
