// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//! - relaying cancellation to running actions
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, or processes.

use crate::dag::Scheduler;
use crate::engine::RuntimeEvent;
use crate::engine::event_handlers::{
    CoreStep, handle_cancel, handle_start, handle_task_completion,
};
use crate::report::RunReport;

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn run_id(&self) -> u64 {
        self.scheduler.run_id()
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.scheduler.is_cancelled()
    }

    /// Dispatch the initial ready set.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted {
                task,
                outcome,
                attempts,
            } => handle_task_completion(&mut self.scheduler, &task, outcome, attempts),
            RuntimeEvent::CancelRequested => handle_cancel(&mut self.scheduler),
        }
    }

    pub fn report(&self) -> RunReport {
        self.scheduler.report()
    }
}
