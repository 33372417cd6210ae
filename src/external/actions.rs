// src/external/actions.rs

//! Adapters from collaborator contracts to [`TaskAction`]s.

use std::sync::Arc;

use anyhow::bail;

use crate::dag::TaskGroup;
use crate::exec::{ActionContext, BoxFuture, TaskAction};
use crate::external::{
    CheckOutcome, CheckRunner, CheckSpec, IngestionTrigger, ModelCatalog, TransformRunner,
};

/// Runs one ingestion job.
pub struct IngestAction {
    trigger: Arc<dyn IngestionTrigger>,
    job_id: String,
}

impl TaskAction for IngestAction {
    fn run(&self, _ctx: ActionContext) -> BoxFuture<'static, anyhow::Result<()>> {
        self.trigger.trigger(&self.job_id)
    }

    fn describe(&self) -> String {
        format!("ingest job {}", self.job_id)
    }
}

/// Runs one quality check; a failing check fails the vertex.
pub struct CheckAction {
    runner: Arc<dyn CheckRunner>,
    spec: CheckSpec,
}

impl TaskAction for CheckAction {
    fn run(&self, _ctx: ActionContext) -> BoxFuture<'static, anyhow::Result<()>> {
        let fut = self.runner.run_check(&self.spec);
        let name = self.spec.name.clone();
        Box::pin(async move {
            match fut.await? {
                CheckOutcome::Pass => Ok(()),
                CheckOutcome::Fail(detail) => bail!("check '{name}' failed: {detail}"),
            }
        })
    }

    fn describe(&self) -> String {
        format!(
            "check {} ({}, {})",
            self.spec.name, self.spec.subpath, self.spec.data_source
        )
    }
}

/// Runs one transform unit.
pub struct TransformAction {
    runner: Arc<dyn TransformRunner>,
    model: String,
}

impl TaskAction for TransformAction {
    fn run(&self, _ctx: ActionContext) -> BoxFuture<'static, anyhow::Result<()>> {
        self.runner.run_model(&self.model)
    }

    fn describe(&self) -> String {
        format!("transform {}", self.model)
    }
}

/// Barrier with no work of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateAction;

impl TaskAction for GateAction {
    fn run(&self, _ctx: ActionContext) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn describe(&self) -> String {
        "gate".to_string()
    }
}

pub fn ingest_action(trigger: Arc<dyn IngestionTrigger>, job_id: impl Into<String>) -> Arc<dyn TaskAction> {
    Arc::new(IngestAction {
        trigger,
        job_id: job_id.into(),
    })
}

pub fn check_action(runner: Arc<dyn CheckRunner>, spec: CheckSpec) -> Arc<dyn TaskAction> {
    Arc::new(CheckAction { runner, spec })
}

pub fn transform_action(runner: Arc<dyn TransformRunner>, model: impl Into<String>) -> Arc<dyn TaskAction> {
    Arc::new(TransformAction {
        runner,
        model: model.into(),
    })
}

pub fn gate_action() -> Arc<dyn TaskAction> {
    Arc::new(GateAction)
}

/// Dynamic group with one transform task per cataloged model.
pub fn transform_group(
    id: impl Into<String>,
    catalog: Arc<dyn ModelCatalog>,
    runner: Arc<dyn TransformRunner>,
) -> TaskGroup {
    TaskGroup::from_catalog(id, catalog, move |model| {
        transform_action(Arc::clone(&runner), model)
    })
}
