// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::Stage;
use crate::external::CommandTemplates;
use crate::types::EmptyGroupPolicy;

use super::duration::deserialize_opt;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// chain = [["load_a", "load_b"], "jobs_done", "audit", "publish"]
///
/// [pipeline]
/// name = "customer_metrics"
///
/// [config]
/// max_concurrency = 4
///
/// [backend]
/// ingest = "trigger-sync {job_id}"
///
/// [task.load_a]
/// kind = "ingest"
/// job_id = "a"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Stages wired together with `chain` semantics.
    #[serde(default)]
    pub chain: Vec<StageConfig>,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub config: ConfigSection,

    /// Command templates for the external collaborators.
    #[serde(default)]
    pub backend: CommandTemplates,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// All groups from `[group.<name>]`.
    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,
}

/// A config that passed [`TryFrom<RawConfigFile>`] validation.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub chain: Vec<StageConfig>,
    pub pipeline: PipelineSection,
    pub config: ConfigSection,
    pub backend: CommandTemplates,
    pub task: BTreeMap<String, TaskConfig>,
    pub group: BTreeMap<String, GroupConfig>,
}

impl ConfigFile {
    /// Wrap a raw config without validating it.
    pub fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            chain: raw.chain,
            pipeline: raw.pipeline,
            config: raw.config,
            backend: raw.backend,
            task: raw.task,
            group: raw.group,
        }
    }
}

/// One chain stage: a single id or a list of ids.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StageConfig {
    One(String),
    Many(Vec<String>),
}

impl StageConfig {
    pub fn ids(&self) -> &[String] {
        match self {
            StageConfig::One(id) => std::slice::from_ref(id),
            StageConfig::Many(ids) => ids,
        }
    }
}

impl From<&StageConfig> for Stage {
    fn from(stage: &StageConfig) -> Self {
        match stage {
            StageConfig::One(id) => Stage::One(id.clone()),
            StageConfig::Many(ids) => Stage::Many(ids.clone()),
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineSection {
    /// Shown in logs and the report; defaults to `"pipeline"`.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Upper bound on simultaneously running tasks.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Default per-attempt timeout, e.g. `"30m"`.
    #[serde(default, deserialize_with = "deserialize_opt")]
    pub task_timeout: Option<Duration>,

    /// Default number of retries after a failed attempt.
    #[serde(default)]
    pub retries: u32,

    #[serde(default, deserialize_with = "deserialize_opt")]
    pub retry_delay: Option<Duration>,

    /// `"satisfied"` (default) or `"error"`.
    #[serde(default)]
    pub empty_group: EmptyGroupPolicy,
}

fn default_max_concurrency() -> usize {
    crate::engine::DEFAULT_MAX_CONCURRENCY
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            task_timeout: None,
            retries: 0,
            retry_delay: None,
            empty_group: EmptyGroupPolicy::default(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// What the task does, selected by `kind = "..."`.
    #[serde(flatten)]
    pub kind: TaskKind,

    /// Explicit upstreams, on top of any chain edges.
    #[serde(default)]
    pub after: Vec<String>,

    /// Per-attempt timeout; falls back to `[config].task_timeout`.
    #[serde(default, deserialize_with = "deserialize_opt")]
    pub timeout: Option<Duration>,

    /// Falls back to `[config].retries`.
    #[serde(default)]
    pub retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskKind {
    /// Trigger an ingestion job through `[backend].ingest`.
    Ingest { job_id: String },
    /// Run a quality check through `[backend].check`.
    Check {
        check: String,
        #[serde(default)]
        subpath: String,
        #[serde(default)]
        data_source: String,
    },
    /// Run one transform unit through `[backend].transform`.
    Transform { model: String },
    /// Run a literal shell command.
    Command { cmd: String },
    /// No-op barrier.
    Gate,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Ingest { .. } => "ingest",
            TaskKind::Check { .. } => "check",
            TaskKind::Transform { .. } => "transform",
            TaskKind::Command { .. } => "command",
            TaskKind::Gate => "gate",
        }
    }
}

/// `[group.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupConfig {
    /// Dynamic group: one transform task per model listed by
    /// `[backend].catalog`.
    #[serde(default)]
    pub catalog: bool,

    /// Static group members (tasks or groups).
    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default)]
    pub after: Vec<String>,
}
