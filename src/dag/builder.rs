// src/dag/builder.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::chain::{Stage, chain_edges};
use crate::dag::graph::DependencyGraph;
use crate::dag::node::{GroupMembers, TaskDefaults, TaskGroup, TaskNode, member_id};
use crate::dag::{VertexId, Workflow};
use crate::errors::BuildError;
use crate::types::EmptyGroupPolicy;

/// Explicit builder for a [`Workflow`].
///
/// Every registration call takes the builder by value and hands it back, so
/// construction reads as one `?`-chained expression and there is no shared
/// registry anywhere:
///
/// ```no_run
/// # use chaindag::dag::{WorkflowBuilder, TaskNode};
/// # use chaindag::external::gate_action;
/// # async fn demo() -> Result<(), chaindag::errors::BuildError> {
/// let workflow = WorkflowBuilder::new("demo")
///     .task(TaskNode::new("a", gate_action()))?
///     .task(TaskNode::new("b", gate_action()))?
///     .task(TaskNode::new("c", gate_action()))?
///     .chain([vec!["a", "b"].into(), "c".into()])?
///     .build()
///     .await?;
/// # Ok(()) }
/// ```
///
/// Tasks and static groups enter the graph immediately, so a cycle among
/// already registered vertices fails fast. Dynamic groups and chains are
/// applied in `build`, which lists each catalog exactly once and then
/// validates the whole graph.
pub struct WorkflowBuilder {
    name: String,
    tags: Vec<String>,
    graph: DependencyGraph,
    tasks: HashMap<VertexId, TaskNode>,
    dynamic: Vec<TaskGroup>,
    chains: Vec<Vec<Stage>>,
    defaults: TaskDefaults,
    empty_groups: EmptyGroupPolicy,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            graph: DependencyGraph::new(),
            tasks: HashMap::new(),
            dynamic: Vec::new(),
            chains: Vec::new(),
            defaults: TaskDefaults::default(),
            empty_groups: EmptyGroupPolicy::default(),
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Timeout / retry settings for tasks that do not set their own.
    pub fn defaults(mut self, defaults: TaskDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn empty_groups(mut self, policy: EmptyGroupPolicy) -> Self {
        self.empty_groups = policy;
        self
    }

    pub fn task(mut self, node: TaskNode) -> Result<Self, BuildError> {
        if self.tasks.contains_key(&node.id) || self.is_pending_dynamic(&node.id) {
            return Err(BuildError::DuplicateVertex(node.id));
        }
        self.graph.add_vertex(&node.id, node.upstreams.iter().cloned())?;
        self.tasks.insert(node.id.clone(), node);
        Ok(self)
    }

    pub fn group(mut self, group: TaskGroup) -> Result<Self, BuildError> {
        if self.graph.contains(&group.id) || self.is_pending_dynamic(&group.id) {
            return Err(BuildError::DuplicateVertex(group.id));
        }
        if group.is_dynamic() {
            self.dynamic.push(group);
            return Ok(self);
        }
        if let GroupMembers::Static(members) = &group.members {
            self.check_empty(&group.id, members.len())?;
            self.graph
                .add_group(&group.id, members.iter().cloned(), group.upstreams.iter().cloned())?;
        }
        Ok(self)
    }

    /// Record a chain of stages. Empty stages are rejected here; the edges
    /// are applied in `build`, once dynamic groups exist.
    pub fn chain<I>(mut self, stages: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = Stage>,
    {
        let stages: Vec<Stage> = stages.into_iter().collect();
        chain_edges(&stages)?;
        self.chains.push(stages);
        Ok(self)
    }

    /// Materialize dynamic groups, apply chains, validate.
    pub async fn build(mut self) -> Result<Workflow, BuildError> {
        for group in std::mem::take(&mut self.dynamic) {
            self.expand_dynamic_group(group).await?;
        }

        for stages in std::mem::take(&mut self.chains) {
            for edge in chain_edges(&stages)? {
                if !self.graph.contains(&edge.upstream) {
                    return Err(BuildError::OrphanReference {
                        owner: "chain".to_string(),
                        reference: edge.upstream,
                    });
                }
                self.graph.add_upstreams(&edge.downstream, [edge.upstream])?;
            }
        }

        self.graph.validate()?;

        let defaults = self.defaults;
        let tasks: HashMap<VertexId, Arc<TaskNode>> = self
            .tasks
            .into_iter()
            .map(|(id, node)| (id, Arc::new(node.with_defaults(&defaults))))
            .collect();

        info!(
            workflow = %self.name,
            tasks = tasks.len(),
            vertices = self.graph.len(),
            "workflow built"
        );

        Ok(Workflow {
            name: self.name,
            tags: self.tags,
            graph: self.graph,
            tasks,
        })
    }

    async fn expand_dynamic_group(&mut self, group: TaskGroup) -> Result<(), BuildError> {
        let GroupMembers::Catalog { catalog, factory } = &group.members else {
            return Ok(());
        };

        let entries = catalog
            .list_models()
            .await
            .map_err(|source| BuildError::Catalog {
                group: group.id.clone(),
                source,
            })?;
        self.check_empty(&group.id, entries.len())?;

        debug!(group = %group.id, entries = entries.len(), "expanding dynamic group");

        let mut members = Vec::with_capacity(entries.len());
        for entry in &entries {
            let id = member_id(&group.id, entry);
            if self.tasks.contains_key(&id) {
                return Err(BuildError::DuplicateVertex(id));
            }
            self.graph.add_vertex(&id, std::iter::empty::<VertexId>())?;
            self.tasks
                .insert(id.clone(), TaskNode::new(id.clone(), factory.as_ref()(entry)));
            members.push(id);
        }

        self.graph
            .add_group(&group.id, members, group.upstreams.iter().cloned())
    }

    fn check_empty(&self, group: &str, members: usize) -> Result<(), BuildError> {
        if members == 0 && self.empty_groups == EmptyGroupPolicy::Error {
            return Err(BuildError::EmptyGroup(group.to_string()));
        }
        Ok(())
    }

    fn is_pending_dynamic(&self, id: &str) -> bool {
        self.dynamic.iter().any(|g| g.id == id)
    }
}
