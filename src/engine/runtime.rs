// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::report::RunReport;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s, and delegates
/// actual task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, watching the cancellation token and dispatching tasks to the
/// executor.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    cancel: CancellationToken,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            cancel,
        }
    }

    /// Main event loop.
    ///
    /// - Dispatches the initial ready set.
    /// - Consumes `RuntimeEvent`s from `event_rx` and cancellation from the
    ///   token, feeding both into the core runtime.
    /// - Executes commands returned by the core.
    /// - Returns the run report once every task is terminal.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(run_id = self.core.run_id(), "runtime started");

        // A run cancelled before it started dispatches nothing.
        let step = if self.cancel.is_cancelled() {
            self.core.step(RuntimeEvent::CancelRequested)
        } else {
            self.core.start()
        };
        let mut keep_running = self.apply(step).await?;

        while keep_running {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !self.core.is_cancelled() => {
                    RuntimeEvent::CancelRequested
                }
                event = self.event_rx.recv() => match event {
                    Some(e) => e,
                    None => {
                        warn!("runtime event channel closed before the run finished");
                        break;
                    }
                },
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            keep_running = self.apply(step).await?;
        }

        let report = self.core.report();
        info!(
            run_id = report.run_id,
            status = %report.status,
            "run finished"
        );
        Ok(report)
    }

    /// Execute the commands of one core step; returns `keep_running`.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            self.execute_command(command).await?;
        }
        Ok(step.keep_running)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                self.spawn_ready(tasks).await?;
            }
            CoreCommand::CancelRunning => {
                // No-op if the token was the source of the request.
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        {
            let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
            debug!(?names, run_id = self.core.run_id(), "spawning ready tasks");
        }

        self.executor.spawn_ready_tasks(tasks).await
    }
}
