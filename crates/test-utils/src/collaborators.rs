//! In-memory collaborators for tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, bail};
use chaindag::exec::BoxFuture;
use chaindag::external::{
    CheckOutcome, CheckRunner, CheckSpec, IngestionTrigger, ModelCatalog, TransformRunner,
};

use crate::actions::Recorder;

/// Catalog returning a fixed list; counts how often it was listed.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    models: Vec<String>,
    listings: AtomicUsize,
}

impl StaticCatalog {
    pub fn new<I, S>(models: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            models: models.into_iter().map(Into::into).collect(),
            listings: AtomicUsize::new(0),
        })
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

impl ModelCatalog for StaticCatalog {
    fn list_models(&self) -> BoxFuture<'static, anyhow::Result<Vec<String>>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let models = self.models.clone();
        Box::pin(async move { Ok(models) })
    }
}

/// Catalog whose listing always fails.
#[derive(Debug)]
pub struct FailingCatalog(pub String);

impl ModelCatalog for FailingCatalog {
    fn list_models(&self) -> BoxFuture<'static, anyhow::Result<Vec<String>>> {
        let msg = self.0.clone();
        Box::pin(async move { Err(anyhow!(msg)) })
    }
}

/// Ingestion, check and transform collaborator that records every call as
/// `"ingest:<job>"`, `"check:<name>"` or `"transform:<model>"`, and fails
/// the calls whose recorded name is in `failing`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    pub recorder: Recorder,
    failing: HashSet<String>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing<I, S>(failing: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            recorder: Recorder::new(),
            failing: failing.into_iter().map(Into::into).collect(),
        })
    }

    fn call(&self, event: String) -> bool {
        let fails = self.failing.contains(&event);
        self.recorder.record(event);
        fails
    }
}

impl IngestionTrigger for ScriptedBackend {
    fn trigger(&self, job_id: &str) -> BoxFuture<'static, anyhow::Result<()>> {
        let fails = self.call(format!("ingest:{job_id}"));
        let job_id = job_id.to_string();
        Box::pin(async move {
            if fails {
                bail!("ingestion job {job_id} failed");
            }
            Ok(())
        })
    }
}

impl CheckRunner for ScriptedBackend {
    fn run_check(&self, check: &CheckSpec) -> BoxFuture<'static, anyhow::Result<CheckOutcome>> {
        let fails = self.call(format!("check:{}", check.name));
        Box::pin(async move {
            if fails {
                Ok(CheckOutcome::Fail("2 rows violate the rule".to_string()))
            } else {
                Ok(CheckOutcome::Pass)
            }
        })
    }
}

impl TransformRunner for ScriptedBackend {
    fn run_model(&self, model: &str) -> BoxFuture<'static, anyhow::Result<()>> {
        let fails = self.call(format!("transform:{model}"));
        let model = model.to_string();
        Box::pin(async move {
            if fails {
                bail!("model {model} failed");
            }
            Ok(())
        })
    }
}
