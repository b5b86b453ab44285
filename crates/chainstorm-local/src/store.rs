//! The in-memory graph store.
//!
//! `InMemoryGraph` wraps one `GraphState` in a reader-writer lock. Reads
//! share the lock, mutations take it exclusively, and every operation runs
//! inside a guard that turns a panic into `GraphError::Internal` instead of
//! tearing down the caller.
//!
//! Traversals hold the read lock for their whole run: they see one consistent
//! graph, and writers wait until they finish.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chainstorm_core::{
    Edge, EdgeId, GraphError, GraphHandler, GraphItem, Node, NodeId, RelatedEdge, Result,
    StoreConfig,
};
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;

use crate::snapshot::{self, DumpSummary};
use crate::state::{DataMode, GraphState};
use crate::traversal::{self, EdgeScope, WeightedPath};

/// Node and edge counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
}

/// A path of nodes with its cumulative edge weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePath {
    pub nodes: Vec<Node>,
    pub weight: i64,
}

pub struct InMemoryGraph {
    state: RwLock<GraphState>,
    data_path: Option<PathBuf>,
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraph {
    /// A store with no snapshot directory; connect and disconnect fail.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GraphState::new()),
            data_path: None,
        }
    }

    /// A store persisted under `path`. Call `connect` to load it.
    pub fn with_data_path(path: impl Into<PathBuf>) -> Self {
        Self {
            state: RwLock::new(GraphState::new()),
            data_path: Some(path.into()),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_data_path(config.data_path.clone())
    }

    fn require_data_path(&self) -> Result<&Path> {
        self.data_path
            .as_deref()
            .ok_or_else(|| GraphError::Config("store has no data_path".to_string()))
    }

    // ── Guards ────────────────────────────────────────────────────

    fn read<T>(&self, op: &'static str, f: impl FnOnce(&GraphState) -> Result<T>) -> Result<T> {
        let guard = self.state.read();
        guarded(op, || f(&guard))
    }

    fn write<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut GraphState) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.state.write();
        let result = guarded(op, || f(&mut guard));
        match &result {
            Ok(_) => tracing::debug!(op, "Mutation applied"),
            Err(e) => tracing::warn!(op, error = %e, "Mutation rejected"),
        }
        result
    }

    // ── Extra queries ─────────────────────────────────────────────

    pub fn stats(&self) -> GraphStats {
        let state = self.state.read();
        GraphStats {
            nodes: state.node_count(),
            edges: state.edge_count(),
        }
    }

    /// Every edge incident to `name`, tagged with its direction.
    pub fn get_all_related_edges(&self, name: &str) -> Result<Vec<RelatedEdge>> {
        self.read("get_all_related_edges", |s| s.related_edges(name))
    }

    /// Breadth-first paths from `name` whose cumulative weight is in `[min, max]`.
    pub fn bfs_with_weight_range(&self, name: &str, min: i64, max: i64) -> Result<Vec<NodePath>> {
        if min > max {
            return Err(GraphError::InvalidInput(format!(
                "weight range is empty: min {min} > max {max}"
            )));
        }
        self.read("bfs_with_weight_range", |s| {
            let start = s.node_id(name)?;
            traversal::bfs_weight_range(s, start, min, max)
                .into_iter()
                .map(|WeightedPath { nodes, weight }| {
                    Ok(NodePath {
                        nodes: s.resolve_nodes(&nodes)?,
                        weight,
                    })
                })
                .collect()
        })
    }

    /// Every maximal simple path from `name`.
    pub fn dfs_with_complete_paths(&self, name: &str) -> Result<Vec<Vec<Node>>> {
        self.read("dfs_with_complete_paths", |s| {
            let start = s.node_id(name)?;
            traversal::dfs_complete_paths(s, start)
                .iter()
                .map(|path| s.resolve_nodes(path))
                .collect()
        })
    }

    /// Write the snapshot without releasing the store.
    pub fn flush(&self) -> Result<DumpSummary> {
        let root = self.require_data_path()?;
        self.read("flush", |s| snapshot::dump(root, s))
    }

    fn levels(
        &self,
        op: &'static str,
        name: &str,
        edges: Option<&[EdgeId]>,
        max: Option<usize>,
    ) -> Result<Vec<Vec<Node>>> {
        self.read(op, |s| {
            let start = s.node_id(name)?;
            let allowed = edges.map(|ids| s.allowed_edges(ids)).transpose()?;
            traversal::bfs_levels(s, start, scope_of(allowed.as_ref()), max)
                .iter()
                .map(|level| s.resolve_nodes(level))
                .collect()
        })
    }
}

fn scope_of(allowed: Option<&HashSet<EdgeId>>) -> EdgeScope<'_> {
    match allowed {
        Some(ids) => EdgeScope::Only(ids),
        None => EdgeScope::All,
    }
}

/// Run `f`, converting a panic into `GraphError::Internal`.
fn guarded<T>(op: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(op, reason = %reason, "Operation panicked");
            Err(GraphError::Internal(format!("{op} panicked: {reason}")))
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| GraphError::InvalidInput(format!("bad pattern: {e}")))
}

impl GraphHandler for InMemoryGraph {
    fn connect(&self) -> Result<()> {
        let root = self.require_data_path()?;
        let loaded = guarded("connect", || snapshot::load(root))?;
        let mut state = self.state.write();
        *state = loaded;
        tracing::info!(
            path = %root.display(),
            nodes = state.node_count(),
            edges = state.edge_count(),
            "Store connected"
        );
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let summary = self.flush()?;
        tracing::info!(
            nodes = summary.nodes,
            edges = summary.edges,
            "Store disconnected"
        );
        Ok(())
    }

    fn add_node(&self, node: Node) -> Result<NodeId> {
        self.write("add_node", |s| s.insert_node(node))
    }

    fn add_edge(&self, edge: Edge) -> Result<EdgeId> {
        self.write("add_edge", |s| s.insert_edge(edge))
    }

    fn replace_node(&self, node: Node) -> Result<()> {
        self.write("replace_node", |s| s.replace_node(node).map(drop))
    }

    fn replace_edge(&self, edge: Edge) -> Result<()> {
        self.write("replace_edge", |s| s.replace_edge(edge).map(drop))
    }

    fn update_node(&self, node: Node) -> Result<()> {
        self.write("update_node", |s| {
            s.mutate_node_data(node, DataMode::Update).map(drop)
        })
    }

    fn update_edge(&self, edge: Edge) -> Result<()> {
        self.write("update_edge", |s| {
            s.mutate_edge_data(edge, DataMode::Update).map(drop)
        })
    }

    fn merge_node(&self, node: Node) -> Result<()> {
        self.write("merge_node", |s| {
            s.mutate_node_data(node, DataMode::Merge).map(drop)
        })
    }

    fn merge_edge(&self, edge: Edge) -> Result<()> {
        self.write("merge_edge", |s| {
            s.mutate_edge_data(edge, DataMode::Merge).map(drop)
        })
    }

    fn delete_node(&self, name: &str) -> Result<()> {
        self.write("delete_node", |s| {
            let (node, edges) = s.remove_node(name)?;
            tracing::debug!(node = %node.id, cascaded = edges.len(), "Node deleted");
            Ok(())
        })
    }

    fn delete_edge(&self, id: &EdgeId) -> Result<()> {
        self.write("delete_edge", |s| s.remove_edge(id).map(drop))
    }

    fn delete_item_by_id(&self, id: &str) -> Result<()> {
        self.write("delete_item_by_id", |s| s.remove_item(id).map(drop))
    }

    fn get_item_by_id(&self, id: &str) -> Result<GraphItem> {
        self.read("get_item_by_id", |s| s.item(id))
    }

    fn get_node(&self, name: &str) -> Result<Node> {
        self.read("get_node", |s| s.node_by_name(name).cloned())
    }

    fn get_nodes_by_regex(&self, pattern: &str) -> Result<Vec<Node>> {
        let re = compile(pattern)?;
        self.read("get_nodes_by_regex", |s| Ok(s.nodes_matching(&re)))
    }

    fn get_edges_by_regex(&self, pattern: &str) -> Result<Vec<Edge>> {
        let re = compile(pattern)?;
        self.read("get_edges_by_regex", |s| Ok(s.edges_matching(&re)))
    }

    fn get_from_nodes(&self, name: &str) -> Result<Vec<Node>> {
        self.read("get_from_nodes", |s| s.from_nodes(name, EdgeScope::All))
    }

    fn get_from_nodes_in_edges(&self, name: &str, edges: &[EdgeId]) -> Result<Vec<Node>> {
        self.read("get_from_nodes_in_edges", |s| {
            s.node_id(name)?;
            let allowed = s.allowed_edges(edges)?;
            s.from_nodes(name, EdgeScope::Only(&allowed))
        })
    }

    fn get_to_nodes(&self, name: &str) -> Result<Vec<Node>> {
        self.read("get_to_nodes", |s| s.to_nodes(name, EdgeScope::All))
    }

    fn get_to_nodes_in_edges(&self, name: &str, edges: &[EdgeId]) -> Result<Vec<Node>> {
        self.read("get_to_nodes_in_edges", |s| {
            s.node_id(name)?;
            let allowed = s.allowed_edges(edges)?;
            s.to_nodes(name, EdgeScope::Only(&allowed))
        })
    }

    fn get_in_edges(&self, name: &str) -> Result<Vec<Edge>> {
        self.read("get_in_edges", |s| {
            let id = s.node_id(name)?;
            Ok(s.in_edges(id).cloned().collect())
        })
    }

    fn get_out_edges(&self, name: &str) -> Result<Vec<Edge>> {
        self.read("get_out_edges", |s| {
            let id = s.node_id(name)?;
            Ok(s.out_edges(id).cloned().collect())
        })
    }

    fn get_all_related_nodes(&self, name: &str) -> Result<Vec<Vec<Node>>> {
        self.levels("get_all_related_nodes", name, None, None)
    }

    fn get_all_related_nodes_in_edge_slice(
        &self,
        name: &str,
        edges: &[EdgeId],
    ) -> Result<Vec<Vec<Node>>> {
        self.levels("get_all_related_nodes_in_edge_slice", name, Some(edges), None)
    }

    fn get_all_related_nodes_in_range(&self, name: &str, max: usize) -> Result<Vec<Vec<Node>>> {
        self.levels("get_all_related_nodes_in_range", name, None, Some(max))
    }
}
