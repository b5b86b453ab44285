//! Authoritative node and edge maps plus their name registries.
//!
//! `GraphState` is the unlocked entity store: every method assumes the caller
//! holds the store lock. Each mutation validates everything that can fail
//! before it touches a map, so an `Err` always means "nothing changed".
//!
//! Adjacency is not indexed. Incident edges are found by scanning the edge
//! map, which keeps the maps as the single source of truth.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path};

use chainstorm_core::{
    Data, Direction, Edge, EdgeId, GraphError, GraphItem, Node, NodeId, RecordKind, RelatedEdge,
    Result,
};
use regex::Regex;

use crate::merge::{merge_data, update_data};
use crate::registry::NameRegistry;
use crate::snapshot::MANIFEST_FILE;
use crate::traversal::EdgeScope;

/// How a data mutation combines the incoming mapping with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Update,
    Merge,
}

impl DataMode {
    fn apply(self, stored: &Data, incoming: Data) -> Result<Data> {
        match self {
            Self::Update => Ok(update_data(stored, incoming)),
            Self::Merge => merge_data(stored, incoming),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphState {
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) edges: BTreeMap<EdgeId, Edge>,
    pub(crate) node_names: NameRegistry<NodeId>,
    pub(crate) edge_names: NameRegistry<EdgeId>,
}

impl Default for GraphState {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphState {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            node_names: NameRegistry::new(RecordKind::Node),
            edge_names: NameRegistry::new(RecordKind::Edge),
        }
    }

    /// Build a state from loaded records: all nodes first, then all edges.
    pub fn from_records(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let mut state = Self::new();
        for node in nodes {
            state.insert_node(node)?;
        }
        for edge in edges {
            state.insert_edge(edge)?;
        }
        Ok(state)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_names(&self) -> &NameRegistry<NodeId> {
        &self.node_names
    }

    pub fn edge_names(&self) -> &NameRegistry<EdgeId> {
        &self.edge_names
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.nodes.contains_key(&NodeId::from(id)) || self.edges.contains_key(&EdgeId::from(id))
    }

    // ── Create ────────────────────────────────────────────────────

    pub fn insert_node(&mut self, mut node: Node) -> Result<NodeId> {
        require(&node.name, "name")?;
        check_collection(&node.collection)?;

        if self.node_names.contains_name(&node.name) {
            return Err(GraphError::DuplicateName {
                kind: RecordKind::Node,
                name: node.name,
            });
        }
        if node.id.is_empty() {
            node.id = NodeId::generate();
        } else if self.id_in_use(node.id.as_str()) {
            return Err(GraphError::AlreadyExists {
                kind: RecordKind::Node,
                id: node.id.0,
            });
        }

        let id = node.id.clone();
        self.node_names.put(&node.name, id.clone())?;
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    pub fn insert_edge(&mut self, mut edge: Edge) -> Result<EdgeId> {
        check_collection(&edge.collection)?;
        require(&edge.relationship, "relationship")?;
        require(edge.from.as_str(), "from")?;
        require(edge.to.as_str(), "to")?;
        self.check_endpoints(&edge)?;

        if self.edge_names.contains_name(&edge.relationship) {
            return Err(GraphError::DuplicateName {
                kind: RecordKind::Edge,
                name: edge.relationship,
            });
        }
        if edge.id.is_empty() {
            edge.id = EdgeId::generate();
        } else if self.id_in_use(edge.id.as_str()) {
            return Err(GraphError::AlreadyExists {
                kind: RecordKind::Edge,
                id: edge.id.0,
            });
        }

        let id = edge.id.clone();
        self.edge_names.put(&edge.relationship, id.clone())?;
        self.edges.insert(id.clone(), edge);
        Ok(id)
    }

    fn check_endpoints(&self, edge: &Edge) -> Result<()> {
        for endpoint in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::EndpointNotFound {
                    id: endpoint.0.clone(),
                });
            }
        }
        Ok(())
    }

    // ── Update ────────────────────────────────────────────────────

    /// Locate the stored node an incoming record refers to.
    ///
    /// A non-empty id wins. When `rename_allowed` is false a non-empty name
    /// must agree with the stored name; otherwise the name only locates the
    /// node when the id is empty.
    fn locate_node(&self, node: &Node, rename_allowed: bool) -> Result<NodeId> {
        if node.id.is_empty() {
            require(&node.name, "name")?;
            return self.node_names.get(&node.name).cloned();
        }
        let stored = self
            .nodes
            .get(&node.id)
            .ok_or_else(|| GraphError::node_not_found(node.id.as_str()))?;
        if !rename_allowed && !node.name.is_empty() && node.name != stored.name {
            return Err(GraphError::InvalidInput(format!(
                "node id {} is registered as {:?}, not {:?}",
                node.id, stored.name, node.name
            )));
        }
        Ok(node.id.clone())
    }

    fn locate_edge(&self, edge: &Edge) -> Result<EdgeId> {
        require(edge.id.as_str(), "id")?;
        if !self.edges.contains_key(&edge.id) {
            return Err(GraphError::edge_not_found(edge.id.as_str()));
        }
        Ok(edge.id.clone())
    }

    /// Substitute the whole node. The identifier is kept; the name may change.
    pub fn replace_node(&mut self, mut node: Node) -> Result<NodeId> {
        let id = self.locate_node(&node, true)?;
        require(&node.name, "name")?;
        check_collection(&node.collection)?;
        if let Ok(holder) = self.node_names.get(&node.name) {
            if holder != &id {
                return Err(GraphError::DuplicateName {
                    kind: RecordKind::Node,
                    name: node.name,
                });
            }
        }

        self.node_names.rename(&id, &node.name)?;
        node.id = id.clone();
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Substitute the whole edge, including its endpoints and relationship.
    pub fn replace_edge(&mut self, edge: Edge) -> Result<EdgeId> {
        let id = self.locate_edge(&edge)?;
        check_collection(&edge.collection)?;
        require(&edge.relationship, "relationship")?;
        require(edge.from.as_str(), "from")?;
        require(edge.to.as_str(), "to")?;
        self.check_endpoints(&edge)?;
        if let Ok(holder) = self.edge_names.get(&edge.relationship) {
            if holder != &id {
                return Err(GraphError::DuplicateName {
                    kind: RecordKind::Edge,
                    name: edge.relationship,
                });
            }
        }

        self.edge_names.rename(&id, &edge.relationship)?;
        self.edges.insert(id.clone(), edge);
        Ok(id)
    }

    /// Apply `node.data` to the stored node's data. Header fields are ignored.
    pub fn mutate_node_data(&mut self, node: Node, mode: DataMode) -> Result<NodeId> {
        let id = self.locate_node(&node, false)?;
        let stored = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| GraphError::node_not_found(id.as_str()))?;
        stored.data = mode.apply(&stored.data, node.data)?;
        Ok(id)
    }

    /// Apply `edge.data` to the stored edge's data. Header fields are ignored.
    pub fn mutate_edge_data(&mut self, edge: Edge, mode: DataMode) -> Result<EdgeId> {
        let id = self.locate_edge(&edge)?;
        let stored = self
            .edges
            .get_mut(&id)
            .ok_or_else(|| GraphError::edge_not_found(id.as_str()))?;
        stored.data = mode.apply(&stored.data, edge.data)?;
        Ok(id)
    }

    // ── Delete ────────────────────────────────────────────────────

    /// Remove a node by name and cascade to every edge touching it.
    /// Returns the removed node and edges.
    pub fn remove_node(&mut self, name: &str) -> Result<(Node, Vec<Edge>)> {
        let id = self.node_names.get(name)?.clone();
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| GraphError::node_not_found(id.as_str()))?;
        self.node_names.remove(name);

        let doomed: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.touches(&id))
            .map(|e| e.id.clone())
            .collect();
        let mut removed = Vec::with_capacity(doomed.len());
        for edge_id in doomed {
            if let Some(edge) = self.edges.remove(&edge_id) {
                self.edge_names.remove_id(&edge_id);
                removed.push(edge);
            }
        }
        Ok((node, removed))
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge> {
        let edge = self
            .edges
            .remove(id)
            .ok_or_else(|| GraphError::edge_not_found(id.as_str()))?;
        self.edge_names.remove_id(id);
        Ok(edge)
    }

    /// Remove whichever record owns `id`; node removal cascades.
    pub fn remove_item(&mut self, id: &str) -> Result<GraphItem> {
        if let Some(node) = self.nodes.get(&NodeId::from(id)) {
            let name = node.name.clone();
            let (node, _) = self.remove_node(&name)?;
            return Ok(GraphItem::Node(node));
        }
        if self.edges.contains_key(&EdgeId::from(id)) {
            return self.remove_edge(&EdgeId::from(id)).map(GraphItem::Edge);
        }
        Err(GraphError::NotFound {
            kind: RecordKind::Item,
            key: id.to_string(),
        })
    }

    // ── Read ──────────────────────────────────────────────────────

    /// Look up a record by identifier: node map first, then edge map.
    pub fn item(&self, id: &str) -> Result<GraphItem> {
        if let Some(node) = self.nodes.get(&NodeId::from(id)) {
            return Ok(GraphItem::Node(node.clone()));
        }
        if let Some(edge) = self.edges.get(&EdgeId::from(id)) {
            return Ok(GraphItem::Edge(edge.clone()));
        }
        Err(GraphError::NotFound {
            kind: RecordKind::Item,
            key: id.to_string(),
        })
    }

    pub fn node_id(&self, name: &str) -> Result<&NodeId> {
        self.node_names.get(name)
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::node_not_found(id.as_str()))
    }

    pub fn node_by_name(&self, name: &str) -> Result<&Node> {
        let id = self.node_names.get(name)?;
        self.node(id)
    }

    pub fn nodes_matching(&self, pattern: &Regex) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|n| pattern.is_match(&n.name))
            .cloned()
            .collect()
    }

    pub fn edges_matching(&self, pattern: &Regex) -> Vec<Edge> {
        self.edges
            .values()
            .filter(|e| pattern.is_match(&e.relationship))
            .cloned()
            .collect()
    }

    /// Edges whose `to` is `id`.
    pub fn in_edges<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |e| &e.to == id)
    }

    /// Edges whose `from` is `id`.
    pub fn out_edges<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |e| &e.from == id)
    }

    /// Distinct source nodes of the in-scope edges pointing at `name`.
    pub fn from_nodes(&self, name: &str, scope: EdgeScope<'_>) -> Result<Vec<Node>> {
        let id = self.node_id(name)?;
        self.distinct_nodes(
            self.in_edges(id)
                .filter(|e| scope.admits(&e.id))
                .map(|e| &e.from),
        )
    }

    /// Distinct target nodes of the in-scope edges leaving `name`.
    pub fn to_nodes(&self, name: &str, scope: EdgeScope<'_>) -> Result<Vec<Node>> {
        let id = self.node_id(name)?;
        self.distinct_nodes(
            self.out_edges(id)
                .filter(|e| scope.admits(&e.id))
                .map(|e| &e.to),
        )
    }

    /// Turn a caller-supplied edge list into a traversal whitelist. Every
    /// identifier must name a stored edge.
    pub fn allowed_edges(&self, ids: &[EdgeId]) -> Result<HashSet<EdgeId>> {
        ids.iter()
            .map(|id| {
                if self.edges.contains_key(id) {
                    Ok(id.clone())
                } else {
                    Err(GraphError::edge_not_found(id.as_str()))
                }
            })
            .collect()
    }

    fn distinct_nodes<'a>(&self, ids: impl Iterator<Item = &'a NodeId>) -> Result<Vec<Node>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for id in ids {
            if seen.insert(id) {
                out.push(self.node(id)?.clone());
            }
        }
        Ok(out)
    }

    /// Every edge incident to `name`, tagged with its direction.
    pub fn related_edges(&self, name: &str) -> Result<Vec<RelatedEdge>> {
        let id = self.node_id(name)?;
        let mut out = Vec::new();
        for edge in self.edges.values() {
            if &edge.from == id {
                out.push(RelatedEdge {
                    direction: Direction::Out,
                    edge: edge.clone(),
                    counterpart: edge.to.clone(),
                });
            }
            if &edge.to == id {
                out.push(RelatedEdge {
                    direction: Direction::In,
                    edge: edge.clone(),
                    counterpart: edge.from.clone(),
                });
            }
        }
        Ok(out)
    }

    /// Resolve a list of identifiers to their nodes.
    pub fn resolve_nodes(&self, ids: &[NodeId]) -> Result<Vec<Node>> {
        ids.iter().map(|id| self.node(id).cloned()).collect()
    }
}

fn require(value: &str, field: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(GraphError::MissingField { field });
    }
    Ok(())
}

/// A collection becomes a snapshot directory, so it must be one plain path
/// component that cannot shadow the manifest.
pub(crate) fn check_collection(collection: &str) -> Result<()> {
    require(collection, "collection")?;
    let mut components = Path::new(collection).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None)
            if c.to_str() == Some(collection) && collection != MANIFEST_FILE =>
        {
            Ok(())
        }
        _ => Err(GraphError::InvalidInput(format!(
            "collection {collection:?} is not a plain directory name"
        ))),
    }
}
