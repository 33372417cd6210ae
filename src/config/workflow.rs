// src/config/workflow.rs

//! Turning a validated config into a [`WorkflowBuilder`].

use std::sync::Arc;

use crate::config::model::{ConfigFile, TaskKind};
use crate::dag::{Stage, TaskDefaults, TaskGroup, TaskNode, WorkflowBuilder};
use crate::engine::RunOptions;
use crate::errors::Result;
use crate::exec::TaskAction;
use crate::external::{
    CheckRunner, CheckSpec, CommandBackend, CommandTemplates, IngestionTrigger, ModelCatalog,
    ShellAction, TransformRunner, check_action, gate_action, ingest_action, transform_action,
    transform_group,
};

/// The external systems config-defined tasks call into.
#[derive(Clone)]
pub struct Collaborators {
    pub ingestion: Arc<dyn IngestionTrigger>,
    pub checks: Arc<dyn CheckRunner>,
    pub catalog: Arc<dyn ModelCatalog>,
    pub transforms: Arc<dyn TransformRunner>,
}

impl Collaborators {
    /// All four collaborators backed by the `[backend]` command templates.
    pub fn from_backend(templates: &CommandTemplates) -> Self {
        let backend = Arc::new(CommandBackend::new(templates.clone()));
        Self {
            ingestion: backend.clone(),
            checks: backend.clone(),
            catalog: backend.clone(),
            transforms: backend,
        }
    }
}

impl ConfigFile {
    pub fn pipeline_name(&self) -> &str {
        self.pipeline.name.as_deref().unwrap_or("pipeline")
    }

    pub fn task_defaults(&self) -> TaskDefaults {
        TaskDefaults {
            timeout: self.config.task_timeout,
            retries: self.config.retries,
            retry_delay: self.config.retry_delay.unwrap_or_default(),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_concurrency: self.config.max_concurrency,
        }
    }

    /// Register every task, group and the chain with a fresh builder.
    ///
    /// Dynamic groups are listed when the returned builder is built.
    pub fn workflow_builder(&self, collab: &Collaborators) -> Result<WorkflowBuilder> {
        let mut builder = WorkflowBuilder::new(self.pipeline_name())
            .tags(self.pipeline.tags.iter().cloned())
            .defaults(self.task_defaults())
            .empty_groups(self.config.empty_group);

        for (name, task) in &self.task {
            let mut node = TaskNode::new(name.clone(), task_action(&task.kind, collab))
                .after(task.after.iter().cloned());
            if let Some(timeout) = task.timeout {
                node = node.timeout(timeout);
            }
            if let Some(retries) = task.retries {
                node = node.retries(retries);
            }
            builder = builder.task(node)?;
        }

        for (name, group) in &self.group {
            let group_def = if group.catalog {
                transform_group(
                    name.clone(),
                    Arc::clone(&collab.catalog),
                    Arc::clone(&collab.transforms),
                )
            } else {
                TaskGroup::new(name.clone(), group.members.iter().cloned())
            };
            builder = builder.group(group_def.after(group.after.iter().cloned()))?;
        }

        if !self.chain.is_empty() {
            builder = builder.chain(self.chain.iter().map(Stage::from))?;
        }

        Ok(builder)
    }
}

fn task_action(kind: &TaskKind, collab: &Collaborators) -> Arc<dyn TaskAction> {
    match kind {
        TaskKind::Ingest { job_id } => ingest_action(Arc::clone(&collab.ingestion), job_id.clone()),
        TaskKind::Check {
            check,
            subpath,
            data_source,
        } => check_action(
            Arc::clone(&collab.checks),
            CheckSpec {
                name: check.clone(),
                subpath: subpath.clone(),
                data_source: data_source.clone(),
            },
        ),
        TaskKind::Transform { model } => {
            transform_action(Arc::clone(&collab.transforms), model.clone())
        }
        TaskKind::Command { cmd } => Arc::new(ShellAction::new(cmd.clone())),
        TaskKind::Gate => gate_action(),
    }
}
