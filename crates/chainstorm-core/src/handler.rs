//! The uniform backend contract.
//!
//! Every storage backend (the local in-memory store, or an adapter over an
//! external graph database) exposes the same logical operations with the same
//! validation order, error kinds, and merge arithmetic. Nodes are addressed by
//! name, edges and generic items by identifier.

use crate::error::Result;
use crate::types::{Edge, EdgeId, GraphItem, Node, NodeId};

pub trait GraphHandler {
    // ── Connection ────────────────────────────────────────────────

    /// Load the backend's state (for the local store: read the snapshot).
    fn connect(&self) -> Result<()>;

    /// Flush the backend's state (for the local store: write the snapshot).
    fn disconnect(&self) -> Result<()>;

    // ── Create ────────────────────────────────────────────────────

    /// Insert a node, assigning an identifier when `node.id` is empty.
    fn add_node(&self, node: Node) -> Result<NodeId>;

    /// Insert an edge between two existing nodes.
    fn add_edge(&self, edge: Edge) -> Result<EdgeId>;

    // ── Update ────────────────────────────────────────────────────

    /// Overwrite the whole stored node.
    fn replace_node(&self, node: Node) -> Result<()>;

    /// Overwrite the whole stored edge.
    fn replace_edge(&self, edge: Edge) -> Result<()>;

    /// Overwrite only the data keys present in `node.data`.
    fn update_node(&self, node: Node) -> Result<()>;

    /// Overwrite only the data keys present in `edge.data`.
    fn update_edge(&self, edge: Edge) -> Result<()>;

    /// Combine `node.data` into the stored data by value type.
    fn merge_node(&self, node: Node) -> Result<()>;

    /// Combine `edge.data` into the stored data by value type.
    fn merge_edge(&self, edge: Edge) -> Result<()>;

    // ── Delete ────────────────────────────────────────────────────

    /// Delete a node by name together with every incident edge.
    fn delete_node(&self, name: &str) -> Result<()>;

    fn delete_edge(&self, id: &EdgeId) -> Result<()>;

    /// Delete whichever record owns `id`.
    fn delete_item_by_id(&self, id: &str) -> Result<()>;

    // ── Read ──────────────────────────────────────────────────────

    fn get_item_by_id(&self, id: &str) -> Result<GraphItem>;

    fn get_node(&self, name: &str) -> Result<Node>;

    fn get_nodes_by_regex(&self, pattern: &str) -> Result<Vec<Node>>;

    /// Edges whose relationship matches `pattern`.
    fn get_edges_by_regex(&self, pattern: &str) -> Result<Vec<Edge>>;

    /// Nodes with an edge pointing at `name`.
    fn get_from_nodes(&self, name: &str) -> Result<Vec<Node>>;

    /// Like `get_from_nodes`, following only the given edges. Every edge
    /// identifier must exist.
    fn get_from_nodes_in_edges(&self, name: &str, edges: &[EdgeId]) -> Result<Vec<Node>>;

    /// Nodes that `name` has an edge pointing at.
    fn get_to_nodes(&self, name: &str) -> Result<Vec<Node>>;

    fn get_to_nodes_in_edges(&self, name: &str, edges: &[EdgeId]) -> Result<Vec<Node>>;

    fn get_in_edges(&self, name: &str) -> Result<Vec<Edge>>;

    fn get_out_edges(&self, name: &str) -> Result<Vec<Edge>>;

    // ── Traversal ─────────────────────────────────────────────────

    /// Breadth-first levels along out-edges, starting with `[name]`.
    fn get_all_related_nodes(&self, name: &str) -> Result<Vec<Vec<Node>>>;

    /// Like `get_all_related_nodes`, considering only the given edges.
    fn get_all_related_nodes_in_edge_slice(
        &self,
        name: &str,
        edges: &[EdgeId],
    ) -> Result<Vec<Vec<Node>>>;

    /// Like `get_all_related_nodes`, emitting at most `max` levels.
    fn get_all_related_nodes_in_range(&self, name: &str, max: usize) -> Result<Vec<Vec<Node>>>;

    // ── Item dispatch ─────────────────────────────────────────────

    fn add_item(&self, item: GraphItem) -> Result<String> {
        match item {
            GraphItem::Node(n) => self.add_node(n).map(|id| id.0),
            GraphItem::Edge(e) => self.add_edge(e).map(|id| id.0),
        }
    }

    fn replace_item(&self, item: GraphItem) -> Result<()> {
        match item {
            GraphItem::Node(n) => self.replace_node(n),
            GraphItem::Edge(e) => self.replace_edge(e),
        }
    }

    fn update_item(&self, item: GraphItem) -> Result<()> {
        match item {
            GraphItem::Node(n) => self.update_node(n),
            GraphItem::Edge(e) => self.update_edge(e),
        }
    }

    fn merge_item(&self, item: GraphItem) -> Result<()> {
        match item {
            GraphItem::Node(n) => self.merge_node(n),
            GraphItem::Edge(e) => self.merge_edge(e),
        }
    }
}
