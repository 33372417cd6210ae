// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning directly.
//! This makes it easy to swap in a fake executor in tests.
//!
//! - `TokioExecutorBackend` is the default implementation. Each scheduled
//!   task runs in its own tokio task and reports back through the runtime
//!   event channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were scheduled and directly emits `TaskCompleted` events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

use super::task_runner::run_task;

/// Trait abstracting how scheduled tasks are executed.
///
/// Every task handed to `spawn_ready_tasks` must eventually produce exactly
/// one `RuntimeEvent::TaskCompleted`, or the run never finishes.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution. Must not wait for them.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Executor backend used in production.
///
/// Dropping it aborts any task still in flight.
pub struct TokioExecutorBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel: CancellationToken,
    in_flight: JoinSet<()>,
}

impl TokioExecutorBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, cancel: CancellationToken) -> Self {
        Self {
            runtime_tx,
            cancel,
            in_flight: JoinSet::new(),
        }
    }
}

impl ExecutorBackend for TokioExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            // Reap runners that already reported.
            while self.in_flight.try_join_next().is_some() {}

            for task in tasks {
                debug!(task = %task.name, run_id = task.run_id, "spawning task runner");
                self.in_flight.spawn(run_task(
                    task,
                    self.runtime_tx.clone(),
                    self.cancel.clone(),
                ));
            }
            Ok(())
        })
    }
}
