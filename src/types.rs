// src/types.rs

//! Small shared enums: vertex states, run status and the empty-group policy.

use std::fmt;

use serde::Deserialize;

/// Per-run state of a vertex.
///
/// `Pending` is initial. `Success`, `Failed`, `UpstreamFailed` and `Skipped`
/// are terminal: once reached, a vertex never changes state again within the
/// same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexState {
    /// Waiting on upstreams.
    Pending,
    /// Upstreams satisfied; waiting for a free concurrency slot.
    Queued,
    /// Action dispatched and executing.
    Running,
    Success,
    /// The vertex's own action failed, timed out or was interrupted.
    Failed,
    /// Never dispatched because an ancestor failed.
    UpstreamFailed,
    /// Never dispatched because the run was cancelled.
    Skipped,
}

impl VertexState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VertexState::Success
                | VertexState::Failed
                | VertexState::UpstreamFailed
                | VertexState::Skipped
        )
    }

    /// `Failed` or `UpstreamFailed`: blocks every downstream vertex.
    pub fn is_failure(self) -> bool {
        matches!(self, VertexState::Failed | VertexState::UpstreamFailed)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(self, next: VertexState) -> bool {
        use VertexState::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Pending, UpstreamFailed)
                | (Pending, Skipped)
                | (Queued, Running)
                | (Queued, Skipped)
                | (Running, Success)
                | (Running, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VertexState::Pending => "PENDING",
            VertexState::Queued => "QUEUED",
            VertexState::Running => "RUNNING",
            VertexState::Success => "SUCCESS",
            VertexState::Failed => "FAILED",
            VertexState::UpstreamFailed => "UPSTREAM_FAILED",
            VertexState::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for VertexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every vertex ended `Success`.
    Succeeded,
    /// At least one vertex ended `Failed` or `UpstreamFailed`.
    Failed,
    /// Cancellation was requested during the run.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Succeeded => f.write_str("succeeded"),
            RunStatus::Failed => f.write_str("failed"),
            RunStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What an empty group (typically a catalog that listed nothing) means.
///
/// - `Satisfied`: the group is vacuously `Success` for downstream gating,
///   once its own upstreams have succeeded.
/// - `Error`: building the workflow fails with `BuildError::EmptyGroup`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyGroupPolicy {
    #[default]
    Satisfied,
    Error,
}
