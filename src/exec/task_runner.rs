// src/exec/task_runner.rs

//! Individual task runner.

use std::any::Any;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::ActionError;
use crate::exec::ActionContext;

/// Run a scheduled task through all of its attempts and emit exactly one
/// `TaskCompleted` event.
///
/// - An attempt fails when the action returns an error, panics, or exceeds
///   the task's timeout. Failed attempts are retried up to `retries` times,
///   `retry_delay` apart.
/// - Cancellation interrupts the running attempt (and any retry delay); the
///   task then completes as `Failed(ActionError::Cancelled)`.
pub async fn run_task(
    task: ScheduledTask,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel: CancellationToken,
) {
    let (outcome, attempts) = execute(&task, &cancel).await;

    let event = RuntimeEvent::TaskCompleted {
        task: task.name.clone(),
        outcome,
        attempts,
    };
    if let Err(err) = runtime_tx.send(event).await {
        error!(
            task = %task.name,
            run_id = task.run_id,
            error = %err,
            "sending TaskCompleted event to runtime failed"
        );
    }
}

/// Run the attempts of `task`; returns the final outcome and how many
/// attempts were made.
pub async fn execute(task: &ScheduledTask, cancel: &CancellationToken) -> (TaskOutcome, u32) {
    let max_attempts = task.retries().saturating_add(1);
    let mut attempt = 1;

    loop {
        info!(
            task = %task.name,
            run_id = task.run_id,
            attempt,
            action = %task.node.action.describe(),
            "starting task attempt"
        );

        let err = match run_attempt(task, attempt, cancel).await {
            Ok(()) => return (TaskOutcome::Success, attempt),
            Err(err) => err,
        };

        if err == ActionError::Cancelled || attempt >= max_attempts {
            return (TaskOutcome::Failed(err), attempt);
        }

        warn!(
            task = %task.name,
            run_id = task.run_id,
            attempt,
            max_attempts,
            error = %err,
            "task attempt failed; retrying"
        );

        let delay = task.retry_delay();
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return (TaskOutcome::Failed(ActionError::Cancelled), attempt);
                }
            }
        }
        attempt += 1;
    }
}

async fn run_attempt(
    task: &ScheduledTask,
    attempt: u32,
    cancel: &CancellationToken,
) -> Result<(), ActionError> {
    if cancel.is_cancelled() {
        return Err(ActionError::Cancelled);
    }

    let ctx = ActionContext {
        task: task.name.clone(),
        attempt,
        cancel: cancel.child_token(),
    };

    // Spawned so that a panic is contained in the join handle, and so that
    // aborting drops the action's future (killing any child process).
    let mut handle = tokio::spawn(task.action().run(ctx));
    let timeout = task.timeout();

    tokio::select! {
        biased;
        joined = &mut handle => match joined {
            Ok(Ok(())) => {
                debug!(task = %task.name, attempt, "action finished");
                Ok(())
            }
            Ok(Err(err)) => Err(ActionError::from_anyhow(&err)),
            Err(join_err) if join_err.is_panic() => {
                Err(ActionError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(ActionError::Failed(format!("action aborted: {join_err}"))),
        },
        _ = cancel.cancelled() => {
            handle.abort();
            info!(task = %task.name, run_id = task.run_id, attempt, "cancelling running action");
            Err(ActionError::Cancelled)
        }
        _ = tokio::time::sleep(timeout.unwrap_or_default()), if timeout.is_some() => {
            handle.abort();
            let limit = timeout.unwrap_or_default();
            warn!(task = %task.name, run_id = task.run_id, attempt, ?limit, "task attempt timed out");
            Err(ActionError::Timeout(limit))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
