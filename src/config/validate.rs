// src/config/validate.rs

use std::collections::BTreeSet;

use crate::config::model::{ConfigFile, RawConfigFile, TaskKind};
use crate::errors::{ChaindagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ChaindagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_vertices(cfg)?;
    validate_global_config(cfg)?;
    validate_names(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_groups(cfg)?;
    validate_chain(cfg)?;
    validate_backend(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> ChaindagError {
    ChaindagError::ConfigError(msg.into())
}

fn ensure_has_vertices(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() && cfg.group.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] or [group.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_concurrency == 0 {
        return Err(config_error("[config].max_concurrency must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.task.keys() {
        if cfg.group.contains_key(name) {
            return Err(config_error(format!(
                "'{name}' is defined both as a task and as a group"
            )));
        }
    }
    Ok(())
}

/// Ids a reference may point at. Dynamic group members are not known until
/// the catalog is listed, so they cannot be referenced from config.
fn known_ids(cfg: &RawConfigFile) -> BTreeSet<&str> {
    cfg.task
        .keys()
        .chain(cfg.group.keys())
        .map(String::as_str)
        .collect()
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let known = known_ids(cfg);
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(config_error(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !known.contains(dep.as_str()) {
                return Err(config_error(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_groups(cfg: &RawConfigFile) -> Result<()> {
    let known = known_ids(cfg);
    for (name, group) in cfg.group.iter() {
        match (group.catalog, group.members.is_empty()) {
            (true, false) => {
                return Err(config_error(format!(
                    "group '{name}' cannot set both `catalog = true` and `members`"
                )));
            }
            (false, true) => {
                return Err(config_error(format!(
                    "group '{name}' must set `catalog = true` or list `members`"
                )));
            }
            _ => {}
        }

        for member in &group.members {
            if member == name {
                return Err(config_error(format!(
                    "group '{name}' cannot contain itself"
                )));
            }
            if !known.contains(member.as_str()) {
                return Err(config_error(format!(
                    "group '{name}' has unknown member '{member}'"
                )));
            }
        }
        for dep in &group.after {
            if dep == name {
                return Err(config_error(format!(
                    "group '{name}' cannot depend on itself in `after`"
                )));
            }
            if !known.contains(dep.as_str()) {
                return Err(config_error(format!(
                    "group '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_chain(cfg: &RawConfigFile) -> Result<()> {
    let known = known_ids(cfg);
    for (index, stage) in cfg.chain.iter().enumerate() {
        if stage.ids().is_empty() {
            return Err(config_error(format!("`chain` stage {index} is empty")));
        }
        for id in stage.ids() {
            if !known.contains(id.as_str()) {
                return Err(config_error(format!(
                    "`chain` stage {index} references unknown vertex '{id}'"
                )));
            }
        }
    }
    Ok(())
}

/// Every collaborator in use needs its command template.
fn validate_backend(cfg: &RawConfigFile) -> Result<()> {
    let backend = &cfg.backend;
    let require = |present: bool, which: &str, user: &str| {
        if present {
            Ok(())
        } else {
            Err(config_error(format!(
                "{user} needs a `{which}` command in [backend]"
            )))
        }
    };

    for (name, task) in cfg.task.iter() {
        let user = format!("{} task '{name}'", task.kind.name());
        match &task.kind {
            TaskKind::Ingest { .. } => require(backend.ingest.is_some(), "ingest", &user)?,
            TaskKind::Check { .. } => require(backend.check.is_some(), "check", &user)?,
            TaskKind::Transform { .. } => {
                require(backend.transform.is_some(), "transform", &user)?
            }
            TaskKind::Command { .. } | TaskKind::Gate => {}
        }
    }

    for (name, _) in cfg.group.iter().filter(|(_, g)| g.catalog) {
        let user = format!("catalog group '{name}'");
        require(backend.catalog.is_some(), "catalog", &user)?;
        require(backend.transform.is_some(), "transform", &user)?;
    }
    Ok(())
}
