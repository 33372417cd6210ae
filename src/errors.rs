// src/errors.rs

//! Crate-wide error types.
//!
//! - [`BuildError`]: fatal problems found while constructing a workflow.
//!   Nothing executes when one of these is returned.
//! - [`ActionError`]: why a single vertex's action did not succeed. These are
//!   recorded on the vertex (`Failed`) and never abort the run.
//! - [`ChaindagError`]: everything the top-level entry points can return.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("cycle detected in DAG: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error("vertex '{vertex}' depends on unknown upstream '{upstream}'")]
    UnknownUpstream { vertex: String, upstream: String },

    #[error("'{owner}' references unknown vertex '{reference}'")]
    OrphanReference { owner: String, reference: String },

    #[error("chain stage {index} is empty")]
    EmptyStage { index: usize },

    #[error("vertex '{0}' is defined more than once")]
    DuplicateVertex(String),

    #[error("vertex '{vertex}' is a member of both '{first}' and '{second}'")]
    DuplicateMembership {
        vertex: String,
        first: String,
        second: String,
    },

    #[error("group '{0}' has no members")]
    EmptyGroup(String),

    #[error("listing catalog for group '{group}' failed: {source:#}")]
    Catalog {
        group: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failure detail captured from an external action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("action panicked: {0}")]
    Panicked(String),
}

impl ActionError {
    /// Capture an `anyhow` error with its full context chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        ActionError::Failed(format!("{err:#}"))
    }
}

#[derive(Error, Debug)]
pub enum ChaindagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ChaindagError>;
