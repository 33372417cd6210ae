// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::{has_path_connecting, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::dag::VertexId;
use crate::dag::state::RunStateTable;
use crate::errors::BuildError;
use crate::types::VertexState;

/// What a vertex is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexKind {
    /// A dispatchable unit of work.
    Task,
    /// A named collection of tasks or nested groups. Never dispatched; its
    /// state is derived from its members.
    Group { members: Vec<VertexId> },
}

#[derive(Debug, Clone)]
struct VertexEntry {
    kind: VertexKind,
    /// Declared upstreams (from `add_vertex`, `add_group`, `add_upstreams`).
    upstreams: BTreeSet<VertexId>,
}

/// Dependency graph of tasks and groups.
///
/// Edges point downstream (`upstream -> vertex`). Group membership is an
/// edge `member -> group`: a group completes only after its members.
///
/// Ids may be referenced before they are defined; [`DependencyGraph::validate`]
/// then checks that every reference resolved, and that the *effective* graph
/// (declared edges plus upstreams members inherit from their enclosing
/// groups) is acyclic. Cycles visible from declared edges alone are rejected
/// as soon as the offending edge is added.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    vertices: BTreeMap<VertexId, VertexEntry>,
    /// member -> enclosing group
    parents: HashMap<VertexId, VertexId>,

    graph: DiGraph<VertexId, ()>,
    index: HashMap<VertexId, NodeIndex>,

    /// Filled in by `validate`.
    effective_upstreams: HashMap<VertexId, Vec<VertexId>>,
    dependents: HashMap<VertexId, Vec<VertexId>>,
    topo_order: Vec<VertexId>,
    validated: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task vertex with its upstreams.
    ///
    /// Fails with `Cycle` if one of the new edges closes a cycle among the
    /// vertices known so far. Unknown upstreams are accepted here and checked
    /// by `validate`.
    pub fn add_vertex<I, S>(&mut self, id: &str, upstreams: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<VertexId>,
    {
        let upstreams: BTreeSet<VertexId> = upstreams.into_iter().map(Into::into).collect();
        self.ensure_undefined(id)?;
        self.check_new_edges(id, upstreams.iter().map(String::as_str))?;

        for up in &upstreams {
            self.add_edge(up, id);
        }
        self.vertices.insert(
            id.to_string(),
            VertexEntry {
                kind: VertexKind::Task,
                upstreams,
            },
        );
        self.validated = false;
        Ok(())
    }

    /// Register a group vertex with its members and upstreams.
    ///
    /// Members inherit the group's upstreams; a vertex can belong to at most
    /// one group.
    pub fn add_group<M, U, S, T>(
        &mut self,
        id: &str,
        members: M,
        upstreams: U,
    ) -> Result<(), BuildError>
    where
        M: IntoIterator<Item = S>,
        S: Into<VertexId>,
        U: IntoIterator<Item = T>,
        T: Into<VertexId>,
    {
        let mut seen = HashSet::new();
        let members: Vec<VertexId> = members
            .into_iter()
            .map(Into::into)
            .filter(|m: &VertexId| seen.insert(m.clone()))
            .collect();
        let upstreams: BTreeSet<VertexId> = upstreams.into_iter().map(Into::into).collect();

        self.ensure_undefined(id)?;
        for member in &members {
            if let Some(first) = self.parents.get(member) {
                return Err(BuildError::DuplicateMembership {
                    vertex: member.clone(),
                    first: first.clone(),
                    second: id.to_string(),
                });
            }
        }
        self.check_new_edges(
            id,
            members
                .iter()
                .chain(upstreams.iter())
                .map(String::as_str),
        )?;

        for member in &members {
            self.add_edge(member, id);
            self.parents.insert(member.clone(), id.to_string());
        }
        for up in &upstreams {
            self.add_edge(up, id);
        }
        self.vertices.insert(
            id.to_string(),
            VertexEntry {
                kind: VertexKind::Group { members },
                upstreams,
            },
        );
        self.validated = false;
        Ok(())
    }

    /// Add extra upstreams to an already registered vertex.
    pub fn add_upstreams<I, S>(&mut self, id: &str, upstreams: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<VertexId>,
    {
        if !self.vertices.contains_key(id) {
            return Err(BuildError::OrphanReference {
                owner: "chain".to_string(),
                reference: id.to_string(),
            });
        }
        let new: BTreeSet<VertexId> = upstreams
            .into_iter()
            .map(Into::into)
            .filter(|u: &VertexId| !self.vertices[id].upstreams.contains(u))
            .collect();
        self.check_new_edges(id, new.iter().map(String::as_str))?;

        for up in &new {
            self.add_edge(up, id);
        }
        if let Some(entry) = self.vertices.get_mut(id) {
            entry.upstreams.extend(new);
        }
        self.validated = false;
        Ok(())
    }

    /// Whole-graph check: every reference resolves, the effective graph is
    /// acyclic. On success, caches effective upstreams, dependents and a
    /// topological order.
    pub fn validate(&mut self) -> Result<(), BuildError> {
        for (id, entry) in &self.vertices {
            for up in &entry.upstreams {
                if !self.vertices.contains_key(up) {
                    return Err(BuildError::UnknownUpstream {
                        vertex: id.clone(),
                        upstream: up.clone(),
                    });
                }
            }
            if let VertexKind::Group { members } = &entry.kind {
                for member in members {
                    if !self.vertices.contains_key(member) {
                        return Err(BuildError::OrphanReference {
                            owner: id.clone(),
                            reference: member.clone(),
                        });
                    }
                }
            }
        }

        let effective: HashMap<VertexId, Vec<VertexId>> = self
            .vertices
            .keys()
            .map(|id| (id.clone(), self.compute_effective_upstreams(id)))
            .collect();

        // Effective graph: inherited upstreams plus membership edges.
        let mut graph: DiGraph<VertexId, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for id in self.vertices.keys() {
            index.insert(id.as_str(), graph.add_node(id.clone()));
        }
        for (id, ups) in &effective {
            for up in ups {
                graph.add_edge(index[up.as_str()], index[id.as_str()], ());
            }
        }
        for (id, entry) in &self.vertices {
            if let VertexKind::Group { members } = &entry.kind {
                for member in members {
                    graph.add_edge(index[member.as_str()], index[id.as_str()], ());
                }
            }
        }

        let order = match toposort(&graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                return Err(BuildError::Cycle {
                    cycle: describe_cycle(&graph, cycle.node_id()),
                });
            }
        };

        let mut dependents: HashMap<VertexId, Vec<VertexId>> = HashMap::new();
        for idx in graph.node_indices() {
            let mut downs: Vec<VertexId> = graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| graph[n].clone())
                .collect();
            downs.sort();
            downs.dedup();
            dependents.insert(graph[idx].clone(), downs);
        }

        self.topo_order = order.into_iter().map(|idx| graph[idx].clone()).collect();
        self.effective_upstreams = effective;
        self.dependents = dependents;
        self.validated = true;

        debug!(
            vertices = self.vertices.len(),
            "dependency graph validated"
        );
        Ok(())
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn kind_of(&self, id: &str) -> Option<&VertexKind> {
        self.vertices.get(id).map(|e| &e.kind)
    }

    pub fn is_group(&self, id: &str) -> bool {
        matches!(self.kind_of(id), Some(VertexKind::Group { .. }))
    }

    /// All vertex ids, sorted.
    pub fn vertices(&self) -> impl Iterator<Item = &str> + Clone {
        self.vertices.keys().map(String::as_str)
    }

    /// Task vertex ids, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> + Clone {
        self.vertices
            .iter()
            .filter(|(_, e)| e.kind == VertexKind::Task)
            .map(|(id, _)| id.as_str())
    }

    /// Group vertex ids, sorted.
    pub fn groups(&self) -> impl Iterator<Item = &str> + Clone {
        self.vertices
            .iter()
            .filter(|(_, e)| e.kind != VertexKind::Task)
            .map(|(id, _)| id.as_str())
    }

    /// Members of a group (empty for tasks and unknown ids).
    pub fn members_of(&self, id: &str) -> &[VertexId] {
        match self.vertices.get(id).map(|e| &e.kind) {
            Some(VertexKind::Group { members }) => members.as_slice(),
            _ => &[],
        }
    }

    /// Enclosing group, if any.
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Upstreams declared directly on the vertex.
    pub fn declared_upstreams_of(&self, id: &str) -> impl Iterator<Item = &str> {
        self.vertices
            .get(id)
            .into_iter()
            .flat_map(|e| e.upstreams.iter().map(String::as_str))
    }

    /// Declared upstreams plus those inherited from enclosing groups.
    ///
    /// Only populated after `validate`.
    pub fn upstreams_of(&self, id: &str) -> &[VertexId] {
        self.effective_upstreams
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Vertices with an effective edge from `id` (downstream vertices, plus
    /// the enclosing group).
    ///
    /// Only populated after `validate`.
    pub fn dependents_of(&self, id: &str) -> &[VertexId] {
        self.dependents
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Topological order of all vertices (upstreams first).
    ///
    /// Only populated after `validate`.
    pub fn topological_order(&self) -> &[VertexId] {
        &self.topo_order
    }

    /// Task vertices that are `Pending` and whose every effective upstream is
    /// satisfied in `table`.
    ///
    /// The iterator is lazy and borrows both graph and table, so it always
    /// reflects a single consistent table snapshot; it can be cloned to
    /// restart the scan.
    pub fn ready_vertices<'a>(
        &'a self,
        table: &'a RunStateTable,
    ) -> impl Iterator<Item = &'a str> + Clone + 'a {
        self.tasks().filter(move |id| {
            matches!(table.state_of(id), Some(VertexState::Pending))
                && self
                    .upstreams_of(id)
                    .iter()
                    .all(|up| table.is_satisfied(self, up))
        })
    }

    fn ensure_undefined(&self, id: &str) -> Result<(), BuildError> {
        if self.vertices.contains_key(id) {
            return Err(BuildError::DuplicateVertex(id.to_string()));
        }
        Ok(())
    }

    /// Reject edges `from -> id` that would close a cycle in the declared graph.
    fn check_new_edges<'a>(
        &self,
        id: &str,
        froms: impl Iterator<Item = &'a str>,
    ) -> Result<(), BuildError> {
        for from in froms {
            if from == id {
                return Err(BuildError::Cycle {
                    cycle: vec![id.to_string(), id.to_string()],
                });
            }
            let (Some(&to_idx), Some(&from_idx)) = (self.index.get(id), self.index.get(from))
            else {
                continue;
            };
            if has_path_connecting(&self.graph, to_idx, from_idx, None) {
                let mut cycle = shortest_path(&self.graph, to_idx, from_idx);
                cycle.push(id.to_string());
                return Err(BuildError::Cycle { cycle });
            }
        }
        Ok(())
    }

    fn node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        let a = self.node(from);
        let b = self.node(to);
        self.graph.update_edge(a, b, ());
    }

    /// Declared upstreams plus those of every enclosing group.
    fn compute_effective_upstreams(&self, id: &str) -> Vec<VertexId> {
        let mut out: BTreeSet<VertexId> = self
            .vertices
            .get(id)
            .map(|e| e.upstreams.clone())
            .unwrap_or_default();

        let mut current = id;
        let mut hops = 0;
        while let Some(parent) = self.parents.get(current) {
            hops += 1;
            if hops > self.vertices.len() {
                break;
            }
            if let Some(entry) = self.vertices.get(parent) {
                out.extend(entry.upstreams.iter().cloned());
            }
            current = parent;
        }

        out.into_iter().collect()
    }
}

/// Shortest path `from -> ... -> to` as vertex names (inclusive).
fn shortest_path(graph: &DiGraph<VertexId, ()>, from: NodeIndex, to: NodeIndex) -> Vec<VertexId> {
    let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    let mut visited = HashSet::from([from]);

    while let Some(node) = queue.pop_front() {
        if node == to {
            break;
        }
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            if visited.insert(next) {
                prev.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    let mut path = vec![graph[to].clone()];
    let mut current = to;
    while current != from {
        match prev.get(&current) {
            Some(&p) => {
                path.push(graph[p].clone());
                current = p;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Name one concrete cycle in the strongly connected component containing
/// `hint` (or the first non-trivial component if `hint` is not on a cycle).
fn describe_cycle(graph: &DiGraph<VertexId, ()>, hint: NodeIndex) -> Vec<VertexId> {
    let sccs = tarjan_scc(graph);
    let on_cycle = |scc: &Vec<NodeIndex>| {
        scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some()
    };
    let start = sccs
        .iter()
        .find(|scc| scc.contains(&hint) && on_cycle(*scc))
        .or_else(|| sccs.iter().find(|scc| on_cycle(*scc)))
        .map(|scc| scc[0])
        .unwrap_or(hint);

    // Walk from any successor of `start` back to `start`.
    for next in graph.neighbors_directed(start, Direction::Outgoing) {
        if next == start {
            return vec![graph[start].clone(), graph[start].clone()];
        }
        if has_path_connecting(graph, next, start, None) {
            let mut cycle = vec![graph[start].clone()];
            cycle.extend(shortest_path(graph, next, start));
            return cycle;
        }
    }
    vec![graph[start].clone()]
}
