// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate references and backend requirements (`validate.rs`).
//! - Turn a validated config into a `WorkflowBuilder` (`workflow.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;
pub mod workflow;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, GroupConfig, PipelineSection, RawConfigFile, StageConfig,
    TaskConfig, TaskKind,
};
pub use workflow::Collaborators;
