// src/dag/node.rs

//! Task and group definitions.
//!
//! These are immutable once handed to a [`WorkflowBuilder`](crate::dag::WorkflowBuilder)
//! and shared read-only across a run. Per-run state lives in
//! [`RunStateTable`](crate::dag::RunStateTable).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dag::VertexId;
use crate::exec::TaskAction;
use crate::external::ModelCatalog;

/// Execution settings that can be defaulted at the workflow level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskDefaults {
    /// Per-attempt timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub retry_delay: Duration,
}

/// The atomic unit of work.
#[derive(Clone)]
pub struct TaskNode {
    pub id: VertexId,
    pub action: Arc<dyn TaskAction>,
    pub upstreams: Vec<VertexId>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl TaskNode {
    pub fn new(id: impl Into<VertexId>, action: Arc<dyn TaskAction>) -> Self {
        Self {
            id: id.into(),
            action,
            upstreams: Vec::new(),
            timeout: None,
            retries: None,
            retry_delay: None,
        }
    }

    pub fn after<I, S>(mut self, upstreams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<VertexId>,
    {
        self.upstreams.extend(upstreams.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Fill unset settings from `defaults`.
    pub(crate) fn with_defaults(mut self, defaults: &TaskDefaults) -> Self {
        self.timeout = self.timeout.or(defaults.timeout);
        self.retries = self.retries.or(Some(defaults.retries));
        self.retry_delay = self.retry_delay.or(Some(defaults.retry_delay));
        self
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("action", &self.action.describe())
            .field("upstreams", &self.upstreams)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

/// Builds the action for one catalog entry of a dynamic group.
pub type MemberFactory = Arc<dyn Fn(&str) -> Arc<dyn TaskAction> + Send + Sync>;

/// Where a group's members come from.
#[derive(Clone)]
pub enum GroupMembers {
    /// Fixed list of already registered (or later registered) vertices.
    Static(Vec<VertexId>),
    /// One task per catalog entry, listed once at build time. Members are
    /// named `<group>.<entry>`.
    Catalog {
        catalog: Arc<dyn ModelCatalog>,
        factory: MemberFactory,
    },
}

/// A named collection of vertices, referencable as a single unit.
#[derive(Clone)]
pub struct TaskGroup {
    pub id: VertexId,
    pub members: GroupMembers,
    pub upstreams: Vec<VertexId>,
}

impl TaskGroup {
    pub fn new<I, S>(id: impl Into<VertexId>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<VertexId>,
    {
        Self {
            id: id.into(),
            members: GroupMembers::Static(members.into_iter().map(Into::into).collect()),
            upstreams: Vec::new(),
        }
    }

    pub fn from_catalog<F>(id: impl Into<VertexId>, catalog: Arc<dyn ModelCatalog>, factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn TaskAction> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            members: GroupMembers::Catalog {
                catalog,
                factory: Arc::new(factory),
            },
            upstreams: Vec::new(),
        }
    }

    pub fn after<I, S>(mut self, upstreams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<VertexId>,
    {
        self.upstreams.extend(upstreams.into_iter().map(Into::into));
        self
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.members, GroupMembers::Catalog { .. })
    }
}

impl fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = match &self.members {
            GroupMembers::Static(ids) => format!("{ids:?}"),
            GroupMembers::Catalog { .. } => "<catalog>".to_string(),
        };
        f.debug_struct("TaskGroup")
            .field("id", &self.id)
            .field("members", &members)
            .field("upstreams", &self.upstreams)
            .finish()
    }
}

/// Id of a dynamic group member.
pub fn member_id(group: &str, entry: &str) -> VertexId {
    format!("{group}.{entry}")
}
