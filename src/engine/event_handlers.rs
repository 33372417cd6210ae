// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::TaskOutcome;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Signal running actions to stop.
    CancelRunning,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Seed the run with every task that is ready at the start.
pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.step_start();
    into_core_step(scheduler, step, Vec::new())
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: &str,
    outcome: TaskOutcome,
    attempts: u32,
) -> CoreStep {
    let step = scheduler.step_completion(task, outcome, attempts);
    into_core_step(scheduler, step, Vec::new())
}

/// Handle a cancellation request.
///
/// Running actions are told to stop; the loop keeps going until each of them
/// has reported back so the final state of every task is known.
pub fn handle_cancel(scheduler: &mut Scheduler) -> CoreStep {
    let already = scheduler.is_cancelled();
    let step = scheduler.step_cancel();
    let commands = if already {
        Vec::new()
    } else {
        vec![CoreCommand::CancelRunning]
    };
    into_core_step(scheduler, step, commands)
}

fn into_core_step(
    scheduler: &Scheduler,
    step: SchedulerStep,
    mut commands: Vec<CoreCommand>,
) -> CoreStep {
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }
    CoreStep {
        commands,
        keep_running: !scheduler.is_finished(),
    }
}
