mod common;
use crate::common::{init_tracing, reference_workflow};

use std::sync::Arc;

use chaindag::dag::{Scheduler, TaskNode, WorkflowBuilder};
use chaindag::engine::{CoreCommand, CoreRuntime, RunOptions, RuntimeEvent, TaskOutcome};
use chaindag::errors::ActionError;
use chaindag::types::{RunStatus, VertexState};
use chaindag_test_utils::actions::{Recorder, succeed};

fn failed(msg: &str) -> TaskOutcome {
    TaskOutcome::Failed(ActionError::Failed(msg.to_string()))
}

async fn reference_scheduler(max_concurrency: usize) -> Scheduler {
    let workflow = reference_workflow(&Recorder::new(), &[]).await;
    let options = RunOptions {
        max_concurrency,
        ..RunOptions::default()
    };
    Scheduler::new(Arc::new(workflow), &options, 1)
}

fn sorted(mut names: Vec<&str>) -> Vec<&str> {
    names.sort();
    names
}

#[tokio::test]
async fn fan_in_waits_for_every_upstream() {
    init_tracing();
    let mut s = reference_scheduler(4).await;

    let step = s.step_start();
    assert_eq!(sorted(step.scheduled_names()), ["L1", "L2"]);
    assert_eq!(s.state_of("S"), Some(VertexState::Pending));

    let step = s.step_completion("L1", TaskOutcome::Success, 1);
    assert!(step.newly_scheduled.is_empty(), "S must wait for L2");
    assert_eq!(s.deps_satisfied("S"), Some(false));

    let step = s.step_completion("L2", TaskOutcome::Success, 1);
    assert_eq!(step.scheduled_names(), ["S"]);
    assert_eq!(s.state_of("S"), Some(VertexState::Running));
}

#[tokio::test]
async fn walking_the_reference_pipeline_succeeds() {
    let mut s = reference_scheduler(4).await;
    let mut running: Vec<String> = s
        .step_start()
        .newly_scheduled
        .into_iter()
        .map(|t| t.name)
        .collect();

    let mut order = Vec::new();
    while let Some(task) = running.pop() {
        order.push(task.clone());
        let step = s.step_completion(&task, TaskOutcome::Success, 1);
        running.extend(step.newly_scheduled.into_iter().map(|t| t.name));
    }

    assert!(s.is_finished());
    assert_eq!(order.len(), 8);
    let report = s.report();
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.ids_in(VertexState::Success).len(), 8);
}

#[tokio::test]
async fn failure_blocks_everything_downstream_only() {
    let mut s = reference_scheduler(4).await;
    s.step_start();
    s.step_completion("L1", TaskOutcome::Success, 1);
    s.step_completion("L2", TaskOutcome::Success, 1);
    s.step_completion("S", TaskOutcome::Success, 1);
    let step = s.step_completion("G", TaskOutcome::Success, 1);
    assert_eq!(sorted(step.scheduled_names()), ["C1", "C2"]);

    let step = s.step_completion("C1", failed("boom"), 3);
    assert_eq!(sorted(step.newly_failed.iter().map(String::as_str).collect()), ["C1", "P", "Q"]);
    assert!(step.newly_scheduled.is_empty());
    assert!(!step.run_just_finished, "C2 is still running");
    assert_eq!(s.state_of("C2"), Some(VertexState::Running));
    assert_eq!(s.state_of("Q"), Some(VertexState::UpstreamFailed));

    let step = s.step_completion("C2", TaskOutcome::Success, 1);
    assert!(step.run_just_finished);

    let report = s.report();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.state_of("C1"), Some(VertexState::Failed));
    assert_eq!(report.state_of("C2"), Some(VertexState::Success));
    assert_eq!(report.state_of("Q"), Some(VertexState::UpstreamFailed));
    assert_eq!(report.state_of("P"), Some(VertexState::UpstreamFailed));
    assert_eq!(
        report.error_of("C1"),
        Some(&ActionError::Failed("boom".to_string()))
    );
    assert_eq!(report.vertex("C1").map(|v| v.attempts), Some(3));
}

#[tokio::test]
async fn concurrency_bound_leaves_ready_tasks_queued() {
    let mut s = reference_scheduler(1).await;

    let step = s.step_start();
    assert_eq!(step.newly_scheduled.len(), 1);
    assert_eq!(s.running_count(), 1);

    let first = step.newly_scheduled[0].name.clone();
    let second = if first == "L1" { "L2" } else { "L1" };
    assert_eq!(s.state_of(second), Some(VertexState::Queued));
    assert_eq!(s.queued(), [second]);

    let step = s.step_completion(&first, TaskOutcome::Success, 1);
    assert_eq!(step.scheduled_names(), [second]);
    assert!(s.queued().is_empty());
}

#[tokio::test]
async fn cancellation_skips_unstarted_and_stops_dispatch() {
    let mut s = reference_scheduler(1).await;
    let first = s.step_start().newly_scheduled[0].name.clone();

    let step = s.step_cancel();
    assert_eq!(step.newly_skipped.len(), 7);
    assert!(!step.run_just_finished);
    assert!(s.is_cancelled());

    // The running task keeps its own outcome, and nothing new is dispatched.
    let step = s.step_completion(&first, TaskOutcome::Success, 1);
    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);

    let report = s.report();
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.state_of(&first), Some(VertexState::Success));
    assert_eq!(report.ids_in(VertexState::Skipped).len(), 7);
}

#[tokio::test]
async fn stale_completions_are_ignored() {
    let mut s = reference_scheduler(4).await;
    s.step_start();

    let step = s.step_completion("S", TaskOutcome::Success, 1);
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(s.state_of("S"), Some(VertexState::Pending));

    s.step_completion("L1", TaskOutcome::Success, 1);
    let step = s.step_completion("L1", failed("late"), 1);
    assert!(step.newly_failed.is_empty());
    assert_eq!(s.state_of("L1"), Some(VertexState::Success));

    let step = s.step_completion("nope", TaskOutcome::Success, 1);
    assert!(step.newly_scheduled.is_empty());
}

#[tokio::test]
async fn core_runtime_turns_events_into_commands() {
    let workflow = WorkflowBuilder::new("wf")
        .task(TaskNode::new("a", succeed()))
        .unwrap()
        .task(TaskNode::new("b", succeed()).after(["a"]))
        .unwrap()
        .build()
        .await
        .unwrap();
    let scheduler = Scheduler::new(Arc::new(workflow), &RunOptions::default(), 7);
    let mut core = CoreRuntime::new(scheduler);

    let step = core.start();
    assert!(step.keep_running);
    assert!(matches!(
        step.commands.as_slice(),
        [CoreCommand::DispatchTasks(tasks)] if tasks.len() == 1 && tasks[0].name == "a" && tasks[0].run_id == 7
    ));

    let step = core.step(RuntimeEvent::TaskCompleted {
        task: "a".to_string(),
        outcome: TaskOutcome::Success,
        attempts: 1,
    });
    assert!(matches!(
        step.commands.as_slice(),
        [CoreCommand::DispatchTasks(tasks)] if tasks[0].name == "b"
    ));

    let step = core.step(RuntimeEvent::CancelRequested);
    assert!(matches!(step.commands.as_slice(), [CoreCommand::CancelRunning]));
    assert!(step.keep_running, "b is still running");

    let step = core.step(RuntimeEvent::TaskCompleted {
        task: "b".to_string(),
        outcome: TaskOutcome::Failed(ActionError::Cancelled),
        attempts: 1,
    });
    assert!(!step.keep_running);

    let report = core.report();
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.state_of("b"), Some(VertexState::Failed));
    assert_eq!(report.error_of("b"), Some(&ActionError::Cancelled));
}
