//! Core record types for the Chainstorm graph.
//!
//! Nodes and edges carry a fixed header (identifier, name or relationship,
//! collection) plus an open-ended JSON data mapping. Identifiers are opaque
//! strings: callers may supply their own, otherwise a UUIDv4 is assigned.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GraphError, RecordKind, Result};

/// The open data mapping attached to every node and edge.
pub type Data = serde_json::Map<String, serde_json::Value>;

/// Interpret an arbitrary JSON value as a data mapping.
pub fn data_from_value(value: serde_json::Value) -> Result<Data> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(Data::new()),
        other => Err(GraphError::InvalidInput(format!(
            "data must be a JSON object, got {other}"
        ))),
    }
}

// ── Identifiers ───────────────────────────────────────────────────

/// Identifier of a node. Empty means "not yet assigned".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of an edge. Empty means "not yet assigned".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Records ───────────────────────────────────────────────────────

/// A named graph vertex.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Node {
    #[serde(default)]
    pub id: NodeId,
    pub name: String,
    /// Descriptive grouping tag, not a storage partition.
    pub collection: String,
    #[serde(default)]
    pub data: Data,
}

impl Node {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::default(),
            name: name.into(),
            collection: collection.into(),
            data: Data::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = NodeId(id.into());
        self
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }
}

/// A directed arc between two existing nodes.
///
/// The edge refers to its endpoints by identifier only; it never owns them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    #[serde(default)]
    pub id: EdgeId,
    pub relationship: String,
    pub collection: String,
    pub from: NodeId,
    pub to: NodeId,
    /// Integer weight summed by weight-range traversal.
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub data: Data,
}

impl Edge {
    pub fn new(
        collection: impl Into<String>,
        relationship: impl Into<String>,
        from: NodeId,
        to: NodeId,
    ) -> Self {
        Self {
            id: EdgeId::default(),
            relationship: relationship.into(),
            collection: collection.into(),
            from,
            to,
            weight: 0,
            data: Data::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = EdgeId(id.into());
        self
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    /// Whether the given node is either endpoint of this edge.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.from == node || &self.to == node
    }
}

/// Either kind of record, for operations that accept or return both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GraphItem {
    Node(Node),
    Edge(Edge),
}

impl GraphItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Node(n) => n.id.as_str(),
            Self::Edge(e) => e.id.as_str(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Node(n) => &n.collection,
            Self::Edge(e) => &e.collection,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Node(_) => RecordKind::Node,
            Self::Edge(_) => RecordKind::Edge,
        }
    }

    /// Unwrap a node, failing with `InvalidInput` for an edge.
    pub fn into_node(self) -> Result<Node> {
        match self {
            Self::Node(n) => Ok(n),
            Self::Edge(e) => Err(GraphError::InvalidInput(format!(
                "expected a node, got edge {}",
                e.id
            ))),
        }
    }

    /// Unwrap an edge, failing with `InvalidInput` for a node.
    pub fn into_edge(self) -> Result<Edge> {
        match self {
            Self::Edge(e) => Ok(e),
            Self::Node(n) => Err(GraphError::InvalidInput(format!(
                "expected an edge, got node {}",
                n.name
            ))),
        }
    }
}

impl From<Node> for GraphItem {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Edge> for GraphItem {
    fn from(edge: Edge) -> Self {
        Self::Edge(edge)
    }
}

// ── Adjacency ─────────────────────────────────────────────────────

/// Direction of an edge relative to the node it was looked up from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The node is the edge's `to` endpoint.
    In,
    /// The node is the edge's `from` endpoint.
    Out,
}

/// An edge incident to a node, with the node at its other end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedEdge {
    pub direction: Direction,
    pub edge: Edge,
    pub counterpart: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique_and_non_empty() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert!(!a.is_empty());
        assert_ne!(a, b);
        assert!(EdgeId::default().is_empty());
    }

    #[test]
    fn node_json_uses_plain_field_names() {
        let node = Node::new("company", "600001")
            .with_id("n-1")
            .with_data(data_from_value(json!({"employees": 1000})).unwrap());

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["id"], "n-1");
        assert_eq!(value["name"], "600001");
        assert_eq!(value["collection"], "company");
        assert_eq!(value["data"]["employees"], 1000);
    }

    #[test]
    fn edge_weight_defaults_to_zero() {
        let edge: Edge = serde_json::from_value(json!({
            "id": "e-1",
            "relationship": "invest",
            "collection": "invest",
            "from": "a",
            "to": "b"
        }))
        .unwrap();
        assert_eq!(edge.weight, 0);
        assert!(edge.data.is_empty());
        assert!(edge.touches(&NodeId::from("b")));
        assert!(!edge.touches(&NodeId::from("c")));
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(data_from_value(json!({"a": 1})).is_ok());
        assert!(data_from_value(serde_json::Value::Null).unwrap().is_empty());
        assert!(matches!(
            data_from_value(json!([1, 2])),
            Err(GraphError::InvalidInput(_))
        ));
    }

    #[test]
    fn graph_item_kind_dispatch() {
        let item = GraphItem::from(Node::new("c", "n"));
        assert_eq!(item.kind(), RecordKind::Node);
        assert_eq!(item.collection(), "c");
        assert!(matches!(
            item.into_edge(),
            Err(GraphError::InvalidInput(_))
        ));

        let edge = Edge::new("c", "r", NodeId::from("a"), NodeId::from("b")).with_id("e");
        let item = GraphItem::from(edge.clone());
        assert_eq!(item.id(), "e");
        assert_eq!(item.kind(), RecordKind::Edge);
        assert!(matches!(
            item.clone().into_node(),
            Err(GraphError::InvalidInput(_))
        ));
        assert_eq!(item.into_edge().unwrap(), edge);
    }
}
