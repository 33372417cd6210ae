use std::collections::BTreeMap;
use std::time::Duration;

use chaindag::config::{
    ConfigFile, ConfigSection, GroupConfig, PipelineSection, RawConfigFile, StageConfig,
    TaskConfig, TaskKind,
};
use chaindag::external::CommandTemplates;

/// Builder for `RawConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                chain: Vec::new(),
                pipeline: PipelineSection::default(),
                config: ConfigSection::default(),
                backend: CommandTemplates::default(),
                task: BTreeMap::new(),
                group: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_group(mut self, name: &str, group: GroupConfig) -> Self {
        self.config.group.insert(name.to_string(), group);
        self
    }

    pub fn with_stage(mut self, ids: &[&str]) -> Self {
        let stage = match ids {
            [one] => StageConfig::One(one.to_string()),
            many => StageConfig::Many(many.iter().map(|s| s.to_string()).collect()),
        };
        self.config.chain.push(stage);
        self
    }

    pub fn with_backend(mut self, backend: CommandTemplates) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.config.config.max_concurrency = n;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            task: TaskConfig {
                kind,
                after: vec![],
                timeout: None,
                retries: None,
            },
        }
    }

    pub fn gate() -> Self {
        Self::new(TaskKind::Gate)
    }

    pub fn command(cmd: &str) -> Self {
        Self::new(TaskKind::Command {
            cmd: cmd.to_string(),
        })
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.task.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.task.retries = Some(retries);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

pub fn static_group(members: &[&str]) -> GroupConfig {
    GroupConfig {
        catalog: false,
        members: members.iter().map(|s| s.to_string()).collect(),
        after: vec![],
    }
}

pub fn catalog_group() -> GroupConfig {
    GroupConfig {
        catalog: true,
        ..GroupConfig::default()
    }
}
