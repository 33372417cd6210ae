// src/dag/chain.rs

//! Declarative chaining of stages.
//!
//! ```text
//! [a, b] -> c -> [d, e]
//! ```
//!
//! produces the edges `a->c`, `b->c`, `c->d`, `c->e`: for two adjacent
//! stages, every member of the earlier stage becomes an upstream of every
//! member of the later one. A set stage is how fan-out and fan-in are
//! written; there is no other mechanism.

use std::collections::HashSet;

use crate::dag::VertexId;
use crate::errors::BuildError;

/// One stage in a chain: a single vertex or a set of vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    One(VertexId),
    Many(Vec<VertexId>),
}

impl Stage {
    pub fn ids(&self) -> &[VertexId] {
        match self {
            Stage::One(id) => std::slice::from_ref(id),
            Stage::Many(ids) => ids.as_slice(),
        }
    }

    fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

impl From<&str> for Stage {
    fn from(id: &str) -> Self {
        Stage::One(id.to_string())
    }
}

impl From<String> for Stage {
    fn from(id: String) -> Self {
        Stage::One(id)
    }
}

impl<S: Into<VertexId>> From<Vec<S>> for Stage {
    fn from(ids: Vec<S>) -> Self {
        Stage::Many(ids.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<VertexId>, const N: usize> From<[S; N]> for Stage {
    fn from(ids: [S; N]) -> Self {
        Stage::Many(ids.into_iter().map(Into::into).collect())
    }
}

/// A single `upstream -> downstream` edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub upstream: VertexId,
    pub downstream: VertexId,
}

/// Expand a chain into its edges (cross product between adjacent stages).
///
/// Fails with `EmptyStage` if any stage has no vertices. A chain with fewer
/// than two stages yields no edges.
pub fn chain_edges(stages: &[Stage]) -> Result<Vec<Edge>, BuildError> {
    if let Some(index) = stages.iter().position(Stage::is_empty) {
        return Err(BuildError::EmptyStage { index });
    }

    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for pair in stages.windows(2) {
        for upstream in pair[0].ids() {
            for downstream in pair[1].ids() {
                let edge = Edge {
                    upstream: upstream.clone(),
                    downstream: downstream.clone(),
                };
                if seen.insert(edge.clone()) {
                    edges.push(edge);
                }
            }
        }
    }
    Ok(edges)
}
