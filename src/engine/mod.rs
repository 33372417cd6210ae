// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the per-run [`Scheduler`]
//! - the main runtime event loop that reacts to:
//!   - task completion events
//!   - cancellation requests
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. [`run_workflow`] wires both to the tokio
//! executor backend and is what most callers want.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dag::{Scheduler, VertexId, Workflow};
use crate::errors::{ActionError, Result};
use crate::exec::TokioExecutorBackend;
use crate::report::RunReport;

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;

/// Default `max_concurrency` when none is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Final outcome of a task's action, after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(ActionError),
}

/// Per-run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Upper bound on simultaneously `Running` tasks. Values below 1 are
    /// treated as 1.
    pub max_concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A dispatched task finished all of its attempts.
    TaskCompleted {
        task: VertexId,
        outcome: TaskOutcome,
        attempts: u32,
    },
    /// Cancellation requested (e.g. Ctrl-C).
    CancelRequested,
}

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a run id, unique within this process.
pub fn next_run_id() -> u64 {
    NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Execute one run of `workflow` to completion (or cancellation).
///
/// Cancelling `cancel` stops new dispatches, skips every unstarted task and
/// interrupts running actions; the returned report then has status
/// [`RunStatus::Cancelled`](crate::types::RunStatus::Cancelled).
///
/// Task failures never make this return `Err`; they are in the report.
pub async fn run_workflow(
    workflow: Arc<Workflow>,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let run_id = next_run_id();
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);

    let executor = TokioExecutorBackend::new(rt_tx, cancel.clone());
    let scheduler = Scheduler::new(workflow, &options, run_id);
    let core = CoreRuntime::new(scheduler);

    Runtime::new(core, rt_rx, executor, cancel).run().await
}
