//! Traversal algorithms over a `GraphState`.
//!
//! All traversals follow out-edges only and work on node identifiers; the
//! store resolves identifiers back to nodes. Callers must hold the store lock
//! for the whole traversal and must pass a start node that exists.

use std::collections::{HashSet, VecDeque};

use chainstorm_core::{Edge, EdgeId, NodeId};
use serde::Serialize;

use crate::state::GraphState;

/// Which edges a traversal may follow.
#[derive(Debug, Clone, Copy)]
pub enum EdgeScope<'a> {
    All,
    Only(&'a HashSet<EdgeId>),
}

impl EdgeScope<'_> {
    pub(crate) fn admits(&self, id: &EdgeId) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(id),
        }
    }
}

/// A path found by weight-range traversal and its cumulative weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightedPath {
    pub nodes: Vec<NodeId>,
    pub weight: i64,
}

fn successors<'a>(
    state: &'a GraphState,
    node: &'a NodeId,
    scope: EdgeScope<'a>,
) -> impl Iterator<Item = &'a Edge> + 'a {
    state.out_edges(node).filter(move |e| scope.admits(&e.id))
}

/// Breadth-first levels from `start`.
///
/// Level 0 is `[start]`; level k holds the nodes first reached in k hops.
/// A node is claimed the moment it is enqueued, so it appears in exactly one
/// level. With `max_levels`, nodes on the last allowed level are not expanded
/// and `Some(0)` yields no levels at all.
pub fn bfs_levels(
    state: &GraphState,
    start: &NodeId,
    scope: EdgeScope<'_>,
    max_levels: Option<usize>,
) -> Vec<Vec<NodeId>> {
    let mut levels: Vec<Vec<NodeId>> = Vec::new();
    if max_levels == Some(0) {
        return levels;
    }

    let mut visited: HashSet<NodeId> = HashSet::from([start.clone()]);
    let mut queue: VecDeque<(NodeId, usize)> = VecDeque::from([(start.clone(), 0)]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth == levels.len() {
            levels.push(Vec::new());
        }
        levels[depth].push(node.clone());

        if max_levels.is_some_and(|max| depth + 1 >= max) {
            continue;
        }
        for edge in successors(state, &node, scope) {
            if visited.insert(edge.to.clone()) {
                queue.push_back((edge.to.clone(), depth + 1));
            }
        }
    }

    levels
}

/// Every breadth-first path from `start` whose summed edge weight lies in
/// `[min, max]`.
///
/// Nodes are claimed when dequeued, so each node contributes at most one
/// path: the first one breadth-first order reaches it by. Nodes outside the
/// range are still expanded. The start node itself has weight 0.
pub fn bfs_weight_range(
    state: &GraphState,
    start: &NodeId,
    min: i64,
    max: i64,
) -> Vec<WeightedPath> {
    let mut found = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<(Vec<NodeId>, i64)> = VecDeque::from([(vec![start.clone()], 0)]);

    while let Some((path, weight)) = queue.pop_front() {
        let Some(node) = path.last().cloned() else {
            continue;
        };
        if !visited.insert(node.clone()) {
            continue;
        }

        for edge in successors(state, &node, EdgeScope::All) {
            if visited.contains(&edge.to) {
                continue;
            }
            let mut next = path.clone();
            next.push(edge.to.clone());
            queue.push_back((next, weight.saturating_add(edge.weight)));
        }

        if (min..=max).contains(&weight) {
            found.push(WeightedPath {
                nodes: path,
                weight,
            });
        }
    }

    found
}

struct Frame {
    node: NodeId,
    targets: Vec<NodeId>,
    cursor: usize,
    leaf: bool,
}

/// Every simple path from `start` that ends at a node with no unvisited
/// successor.
///
/// Nodes are released on backtrack, so a node may appear on many paths but
/// never twice on one. The number of paths can grow exponentially with the
/// graph's branching.
pub fn dfs_complete_paths(state: &GraphState, start: &NodeId) -> Vec<Vec<NodeId>> {
    let mut paths = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut path: Vec<NodeId> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    let enter = |node: NodeId,
                 visited: &mut HashSet<NodeId>,
                 path: &mut Vec<NodeId>,
                 stack: &mut Vec<Frame>| {
        let targets = state.out_edges(&node).map(|e| e.to.clone()).collect();
        visited.insert(node.clone());
        path.push(node.clone());
        stack.push(Frame {
            node,
            targets,
            cursor: 0,
            leaf: true,
        });
    };

    enter(start.clone(), &mut visited, &mut path, &mut stack);

    while let Some(frame) = stack.last_mut() {
        let mut next = None;
        while frame.cursor < frame.targets.len() {
            let target = &frame.targets[frame.cursor];
            frame.cursor += 1;
            if !visited.contains(target) {
                next = Some(target.clone());
                break;
            }
        }

        match next {
            Some(target) => {
                frame.leaf = false;
                enter(target, &mut visited, &mut path, &mut stack);
            }
            None => {
                let leaf = frame.leaf;
                let node = frame.node.clone();
                if leaf {
                    paths.push(path.clone());
                }
                visited.remove(&node);
                path.pop();
                stack.pop();
            }
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstorm_core::{Edge, Node};

    struct Fixture {
        state: GraphState,
    }

    impl Fixture {
        fn new(names: &[&str]) -> Self {
            let mut state = GraphState::new();
            for name in names {
                state
                    .insert_node(Node::new("test", *name).with_id(*name))
                    .unwrap();
            }
            Self { state }
        }

        fn link(&mut self, from: &str, to: &str, weight: i64) -> EdgeId {
            let rel = format!("{from}->{to}");
            self.state
                .insert_edge(
                    Edge::new("test", rel.as_str(), NodeId::from(from), NodeId::from(to))
                        .with_id(rel.as_str())
                        .with_weight(weight),
                )
                .unwrap()
        }
    }

    fn ids(level: &[NodeId]) -> Vec<&str> {
        level.iter().map(NodeId::as_str).collect()
    }

    fn sorted(level: &[NodeId]) -> Vec<&str> {
        let mut out = ids(level);
        out.sort_unstable();
        out
    }

    #[test]
    fn bfs_chain_yields_one_node_per_level() {
        let mut g = Fixture::new(&["a", "b", "c", "d"]);
        g.link("a", "b", 0);
        g.link("b", "c", 0);
        g.link("c", "d", 0);

        let levels = bfs_levels(&g.state, &NodeId::from("a"), EdgeScope::All, None);
        let flat: Vec<Vec<&str>> = levels.iter().map(|l| ids(l)).collect();
        assert_eq!(flat, vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]]);
    }

    #[test]
    fn bfs_isolated_node_is_its_own_level() {
        let g = Fixture::new(&["a"]);
        let levels = bfs_levels(&g.state, &NodeId::from("a"), EdgeScope::All, None);
        assert_eq!(levels.len(), 1);
        assert_eq!(ids(&levels[0]), vec!["a"]);
    }

    #[test]
    fn bfs_diamond_claims_nodes_once() {
        let mut g = Fixture::new(&["a", "b", "c", "d"]);
        g.link("a", "b", 0);
        g.link("a", "c", 0);
        g.link("b", "d", 0);
        g.link("c", "d", 0);
        g.link("d", "a", 0);

        let levels = bfs_levels(&g.state, &NodeId::from("a"), EdgeScope::All, None);
        assert_eq!(levels.len(), 3);
        assert_eq!(sorted(&levels[1]), vec!["b", "c"]);
        assert_eq!(ids(&levels[2]), vec!["d"]);
    }

    #[test]
    fn bfs_bounded_truncates() {
        let mut g = Fixture::new(&["a", "b", "c", "d"]);
        g.link("a", "b", 0);
        g.link("b", "c", 0);
        g.link("c", "d", 0);
        let start = NodeId::from("a");

        assert!(bfs_levels(&g.state, &start, EdgeScope::All, Some(0)).is_empty());
        assert_eq!(bfs_levels(&g.state, &start, EdgeScope::All, Some(1)).len(), 1);
        let two = bfs_levels(&g.state, &start, EdgeScope::All, Some(2));
        assert_eq!(two.len(), 2);
        assert_eq!(ids(&two[1]), vec!["b"]);
        assert_eq!(bfs_levels(&g.state, &start, EdgeScope::All, Some(10)).len(), 4);
    }

    #[test]
    fn bfs_edge_scope_restricts_expansion() {
        let mut g = Fixture::new(&["a", "b", "c"]);
        let ab = g.link("a", "b", 0);
        g.link("a", "c", 0);
        g.link("b", "c", 0);

        let allowed = HashSet::from([ab]);
        let levels = bfs_levels(&g.state, &NodeId::from("a"), EdgeScope::Only(&allowed), None);
        assert_eq!(levels.len(), 2);
        assert_eq!(ids(&levels[1]), vec!["b"]);

        let none = HashSet::new();
        let levels = bfs_levels(&g.state, &NodeId::from("a"), EdgeScope::Only(&none), None);
        assert_eq!(levels.len(), 1);
    }

    #[test]
    fn weight_range_filters_by_cumulative_weight() {
        let mut g = Fixture::new(&["a", "b", "c", "d"]);
        g.link("a", "b", 2);
        g.link("b", "c", 3);
        g.link("a", "d", 10);

        let paths = bfs_weight_range(&g.state, &NodeId::from("a"), 1, 5);
        let mut found: Vec<(Vec<&str>, i64)> =
            paths.iter().map(|p| (ids(&p.nodes), p.weight)).collect();
        found.sort();
        assert_eq!(found, vec![(vec!["a", "b"], 2), (vec!["a", "b", "c"], 5)]);
    }

    #[test]
    fn weight_range_includes_start_when_zero_is_in_range() {
        let mut g = Fixture::new(&["a", "b"]);
        g.link("a", "b", 4);

        let paths = bfs_weight_range(&g.state, &NodeId::from("a"), 0, 0);
        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0].nodes), vec!["a"]);
    }

    #[test]
    fn dfs_records_paths_at_leaves() {
        let mut g = Fixture::new(&["a", "b", "c", "d"]);
        g.link("a", "b", 0);
        g.link("a", "c", 0);
        g.link("b", "d", 0);
        g.link("c", "d", 0);

        let found = dfs_complete_paths(&g.state, &NodeId::from("a"));
        let mut paths: Vec<Vec<&str>> = found.iter().map(|p| ids(p)).collect();
        paths.sort();
        assert_eq!(paths, vec![vec!["a", "b", "d"], vec!["a", "c", "d"]]);
    }

    #[test]
    fn dfs_cycle_terminates() {
        let mut g = Fixture::new(&["a", "b"]);
        g.link("a", "b", 0);
        g.link("b", "a", 0);
        g.link("a", "a", 0);

        let paths = dfs_complete_paths(&g.state, &NodeId::from("a"));
        assert_eq!(paths.len(), 1);
        assert_eq!(ids(&paths[0]), vec!["a", "b"]);
    }

    #[test]
    fn dfs_isolated_node_is_a_single_path() {
        let g = Fixture::new(&["a"]);
        let paths = dfs_complete_paths(&g.state, &NodeId::from("a"));
        assert_eq!(paths, vec![vec![NodeId::from("a")]]);
    }
}
