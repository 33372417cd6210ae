#![allow(dead_code)]

use std::sync::Arc;

use chaindag::dag::{Stage, TaskNode, Workflow, WorkflowBuilder};
use chaindag::engine::{RunOptions, run_workflow};
use chaindag::report::RunReport;
use chaindag_test_utils::actions::Recorder;
use tokio_util::sync::CancellationToken;

pub use chaindag_test_utils::{init_tracing, with_timeout};

/// Task ids of the reference pipeline, in declaration order.
pub const REFERENCE_TASKS: [&str; 8] = ["L1", "L2", "S", "G", "C1", "C2", "Q", "P"];

/// `[L1, L2] -> S -> G -> [C1, C2] -> Q -> P`, every action recording its
/// id in `recorder`; the ids in `failing` fail instead.
pub async fn reference_workflow(recorder: &Recorder, failing: &[&str]) -> Workflow {
    let mut builder = WorkflowBuilder::new("reference").tags(["ingest", "audit"]);
    for id in REFERENCE_TASKS {
        let action = if failing.contains(&id) {
            recorder.fail(id, "boom")
        } else {
            recorder.ok(id)
        };
        builder = builder.task(TaskNode::new(id, action)).unwrap();
    }
    builder
        .chain(reference_stages())
        .unwrap()
        .build()
        .await
        .unwrap()
}

pub fn reference_stages() -> Vec<Stage> {
    vec![
        vec!["L1", "L2"].into(),
        "S".into(),
        "G".into(),
        vec!["C1", "C2"].into(),
        "Q".into(),
        "P".into(),
    ]
}

/// Run with default options and a token nobody cancels.
pub async fn run(workflow: Workflow) -> RunReport {
    run_with(workflow, RunOptions::default()).await
}

pub async fn run_with(workflow: Workflow, options: RunOptions) -> RunReport {
    with_timeout(run_workflow(
        Arc::new(workflow),
        options,
        CancellationToken::new(),
    ))
    .await
    .unwrap()
}
