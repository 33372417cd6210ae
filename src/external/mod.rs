// src/external/mod.rs

//! Contracts for the external systems task actions call into.
//!
//! The engine never talks to these directly; it only runs [`TaskAction`]s.
//! [`actions`] adapts each collaborator into an action, and [`command`]
//! provides implementations that run templated shell commands, so a pipeline
//! can be wired to any CLI-driven ingestion, check or transform tool.
//!
//! [`TaskAction`]: crate::exec::TaskAction

pub mod actions;
pub mod command;

pub use actions::{
    CheckAction, GateAction, IngestAction, TransformAction, check_action, gate_action,
    ingest_action, transform_action, transform_group,
};
pub use command::{CommandBackend, CommandTemplates, ShellAction};

use crate::exec::BoxFuture;

/// Triggers one external data-load job and waits for it to finish.
pub trait IngestionTrigger: Send + Sync {
    fn trigger(&self, job_id: &str) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// One data-quality check definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSpec {
    pub name: String,
    pub subpath: String,
    pub data_source: String,
}

/// Result of a check that ran to completion. Errors running the check are
/// reported through the `Err` side instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Pass,
    Fail(String),
}

/// Runs a data-quality check in an environment isolated from the
/// orchestrator's own.
pub trait CheckRunner: Send + Sync {
    fn run_check(&self, check: &CheckSpec) -> BoxFuture<'static, anyhow::Result<CheckOutcome>>;
}

/// Lists the transform units to materialize as a dynamic group.
pub trait ModelCatalog: Send + Sync {
    fn list_models(&self) -> BoxFuture<'static, anyhow::Result<Vec<String>>>;
}

/// Executes one cataloged transform unit.
pub trait TransformRunner: Send + Sync {
    fn run_model(&self, model: &str) -> BoxFuture<'static, anyhow::Result<()>>;
}
