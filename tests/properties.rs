use std::collections::{BTreeMap, BTreeSet};

use chaindag::dag::{DependencyGraph, RunStateTable, Stage, chain_edges};
use chaindag::errors::BuildError;
use chaindag::types::VertexState;
use proptest::prelude::*;

fn name(i: usize) -> String {
    format!("v{i}")
}

/// Reference model of a generated graph: tasks, groups of tasks, and
/// declared upstreams by index.
#[derive(Debug, Clone)]
struct Shape {
    n: usize,
    groups: BTreeSet<usize>,
    members: BTreeMap<usize, Vec<usize>>,
    ups: BTreeMap<usize, BTreeSet<usize>>,
}

impl Shape {
    /// Vertex `v` is a group when `is_group[v]`. A task joins group
    /// `owner[v]` when that vertex is a group (and, with `forward_only`,
    /// comes after the task).
    fn new(
        n: usize,
        edges: &[(usize, usize)],
        is_group: &[bool],
        owner: &[usize],
        forward_only: bool,
    ) -> Self {
        let groups: BTreeSet<usize> = (0..n).filter(|v| is_group[*v]).collect();
        let mut members: BTreeMap<usize, Vec<usize>> =
            groups.iter().map(|g| (*g, Vec::new())).collect();
        for v in 0..n {
            let g = owner[v];
            if !groups.contains(&v) && groups.contains(&g) && (!forward_only || v < g) {
                members.entry(g).or_default().push(v);
            }
        }

        let mut ups: BTreeMap<usize, BTreeSet<usize>> =
            (0..n).map(|i| (i, BTreeSet::new())).collect();
        for &(up, down) in edges {
            if up < n && down < n && up != down {
                ups.entry(down).or_default().insert(up);
            }
        }
        Self {
            n,
            groups,
            members,
            ups,
        }
    }

    fn tasks(&self) -> Vec<usize> {
        (0..self.n).filter(|v| !self.groups.contains(v)).collect()
    }

    /// Edges the run actually waits on: declared upstreams, upstreams members
    /// inherit from their group, and `member -> group`.
    fn effective(&self) -> BTreeMap<usize, BTreeSet<usize>> {
        let mut eff = self.ups.clone();
        for (g, members) in &self.members {
            for m in members {
                let inherited = self.ups[g].clone();
                eff.entry(*m).or_default().extend(inherited);
                eff.entry(*g).or_default().insert(*m);
            }
        }
        eff
    }

    fn build(&self) -> Result<DependencyGraph, BuildError> {
        let mut g = DependencyGraph::new();
        for v in 0..self.n {
            let ups = self.ups[&v].iter().map(|i| name(*i));
            match self.members.get(&v) {
                Some(members) => g.add_group(&name(v), members.iter().map(|m| name(*m)), ups)?,
                None => g.add_vertex(&name(v), ups)?,
            }
        }
        g.validate()?;
        Ok(g)
    }
}

/// Kahn's algorithm over an upstream map.
fn is_acyclic(ups: &BTreeMap<usize, BTreeSet<usize>>) -> bool {
    let mut remaining = ups.clone();
    loop {
        let ready: Vec<usize> = remaining
            .iter()
            .filter(|(_, u)| u.iter().all(|x| !remaining.contains_key(x)))
            .map(|(v, _)| *v)
            .collect();
        if ready.is_empty() {
            return remaining.is_empty();
        }
        for v in ready {
            remaining.remove(&v);
        }
    }
}

fn reachable_from(ups: &BTreeMap<usize, BTreeSet<usize>>, start: usize) -> BTreeSet<usize> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(v) = stack.pop() {
        for (down, u) in ups {
            if u.contains(&v) && seen.insert(*down) {
                stack.push(*down);
            }
        }
    }
    seen
}

/// Graphs of up to `max - 1` vertices, roughly a third of them groups.
/// With `forward_only`, every declared edge and membership points from a
/// lower to a higher index.
fn shapes(max: usize, forward_only: bool) -> impl Strategy<Value = Shape> {
    (2..max)
        .prop_flat_map(move |n| {
            let edge = (0..n, 0..n).prop_map(move |(a, b)| {
                if forward_only { (a.min(b), a.max(b)) } else { (a, b) }
            });
            (
                Just(n),
                prop::collection::vec(edge, 0..n * 2),
                prop::collection::vec(prop::bool::weighted(0.3), n),
                prop::collection::vec(0..n, n),
            )
        })
        .prop_map(move |(n, edges, is_group, owner)| {
            Shape::new(n, &edges, &is_group, &owner, forward_only)
        })
}

proptest! {
    #[test]
    fn graph_builds_iff_acyclic(shape in shapes(9, false)) {
        let eff = shape.effective();
        match shape.build() {
            Ok(g) => {
                prop_assert!(is_acyclic(&eff));
                prop_assert!(g.is_validated());
                let order = g.topological_order();
                prop_assert_eq!(order.len(), shape.n);
                let pos = |id: &str| order.iter().position(|v| v == id);
                for (down, u) in &eff {
                    for up in u {
                        prop_assert!(pos(&name(*up)) < pos(&name(*down)));
                    }
                }
            }
            Err(BuildError::Cycle { cycle }) => {
                prop_assert!(!is_acyclic(&eff));
                prop_assert!(cycle.len() >= 2);
                prop_assert_eq!(cycle.first(), cycle.last());
            }
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    #[test]
    fn chain_links_exactly_adjacent_stages(sizes in prop::collection::vec(1usize..4, 0..6)) {
        let stages: Vec<Vec<String>> = sizes
            .iter()
            .enumerate()
            .map(|(s, len)| (0..*len).map(|i| format!("s{s}_{i}")).collect())
            .collect();
        let edges = chain_edges(
            &stages.iter().cloned().map(Stage::from).collect::<Vec<_>>(),
        )
        .unwrap();

        let expected: usize = sizes.windows(2).map(|w| w[0] * w[1]).sum();
        prop_assert_eq!(edges.len(), expected);

        let stage_of = |id: &str| stages.iter().position(|s| s.iter().any(|x| x == id));
        for edge in &edges {
            let up = stage_of(&edge.upstream).unwrap();
            let down = stage_of(&edge.downstream).unwrap();
            prop_assert_eq!(up + 1, down);
        }
    }

    #[test]
    fn failure_blocks_exactly_the_reachable_set(
        shape in shapes(10, true),
        pick in any::<prop::sample::Index>(),
    ) {
        let eff = shape.effective();
        prop_assume!(is_acyclic(&eff));
        let tasks = shape.tasks();
        prop_assume!(!tasks.is_empty());

        let g = shape.build().unwrap();
        let failed = tasks[pick.index(tasks.len())];
        let id = name(failed);

        let mut table = RunStateTable::new(&g);
        prop_assert!(table.transition(&id, VertexState::Queued));
        prop_assert!(table.transition(&id, VertexState::Running));
        prop_assert!(table.transition(&id, VertexState::Failed));

        let reach = reachable_from(&eff, failed);
        let blocked: BTreeSet<String> = table
            .mark_dependents_upstream_failed(&g, &id)
            .into_iter()
            .collect();
        let expected: BTreeSet<String> = reach
            .iter()
            .filter(|v| !shape.groups.contains(v))
            .map(|v| name(*v))
            .collect();
        prop_assert_eq!(&blocked, &expected);

        for v in 0..shape.n {
            let state = table.effective_state(&g, &name(v));
            let owns_failed = shape.members.get(&v).is_some_and(|m| m.contains(&failed));
            if v == failed || owns_failed {
                prop_assert_eq!(state, Some(VertexState::Failed), "{}", name(v));
            } else if reach.contains(&v) {
                prop_assert_eq!(state, Some(VertexState::UpstreamFailed), "{}", name(v));
            } else {
                prop_assert!(
                    state.is_some_and(|s| !s.is_failure()),
                    "{} is {:?} but unreachable from {}",
                    name(v),
                    state,
                    id
                );
            }
        }
    }
}
