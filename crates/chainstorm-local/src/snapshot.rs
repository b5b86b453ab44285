//! JSON snapshot persistence.
//!
//! Layout under the data root:
//! ```text
//! {root}/
//!   InMemoryDB.json          # manifest: both name maps + export time
//!   {collection}/
//!     {id}.json              # one pretty-printed node or edge
//! ```
//!
//! Records are authoritative. The manifest is only cross-checked on load.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chainstorm_core::{Edge, EdgeId, GraphError, Node, NodeId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{check_collection, GraphState};

/// File name of the manifest at the data root.
pub const MANIFEST_FILE: &str = "InMemoryDB.json";

const EDGE_KEYS: [&str; 5] = ["id", "from", "to", "collection", "relationship"];
const NODE_KEYS: [&str; 3] = ["id", "name", "collection"];

/// The registry export written next to the collection directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub exported_at: DateTime<Utc>,
    pub node_names: BTreeMap<String, NodeId>,
    pub edge_names: BTreeMap<String, EdgeId>,
}

impl Manifest {
    fn of(state: &GraphState) -> Self {
        Self {
            exported_at: Utc::now(),
            node_names: state
                .node_names()
                .iter()
                .map(|(name, id)| (name.to_string(), id.clone()))
                .collect(),
            edge_names: state
                .edge_names()
                .iter()
                .map(|(name, id)| (name.to_string(), id.clone()))
                .collect(),
        }
    }
}

/// Counts reported by a completed dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpSummary {
    pub nodes: usize,
    pub edges: usize,
}

enum Record {
    Node(Node),
    Edge(Edge),
}

fn snapshot_error(path: &Path, reason: impl Into<String>) -> GraphError {
    GraphError::Snapshot {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

// ── Load ──────────────────────────────────────────────────────────

/// Build a fresh state from the snapshot under `root`.
///
/// A missing root yields an empty state. Any unreadable or unclassifiable
/// record fails the whole load.
pub fn load(root: &Path) -> Result<GraphState> {
    if !root.exists() {
        tracing::info!(path = %root.display(), "No snapshot directory, starting empty");
        return Ok(GraphState::new());
    }

    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for dir in sorted_entries(root)? {
        if !dir.is_dir() {
            continue;
        }
        for file in sorted_entries(&dir)? {
            if !is_json_file(&file) {
                continue;
            }
            match read_record(&file)? {
                Record::Node(node) => nodes.push(node),
                Record::Edge(edge) => edges.push(edge),
            }
        }
    }

    let state = GraphState::from_records(nodes, edges)?;
    check_manifest(root, &state);

    tracing::debug!(
        path = %root.display(),
        nodes = state.node_count(),
        edges = state.edge_count(),
        "Snapshot loaded"
    );
    Ok(state)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn is_json_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn read_record(path: &Path) -> Result<Record> {
    let json = fs::read_to_string(path)?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| snapshot_error(path, e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(snapshot_error(path, "document is not a JSON object"));
    };
    let has_all = |keys: &[&str]| keys.iter().all(|k| object.contains_key(*k));

    let record = if has_all(&EDGE_KEYS[..]) {
        let edge: Edge =
            serde_json::from_value(value).map_err(|e| snapshot_error(path, e.to_string()))?;
        if edge.id.is_empty() {
            return Err(snapshot_error(path, "edge has an empty id"));
        }
        Record::Edge(edge)
    } else if has_all(&NODE_KEYS[..]) {
        let node: Node =
            serde_json::from_value(value).map_err(|e| snapshot_error(path, e.to_string()))?;
        if node.id.is_empty() {
            return Err(snapshot_error(path, "node has an empty id"));
        }
        Record::Node(node)
    } else {
        return Err(snapshot_error(path, "document is neither a node nor an edge"));
    };

    if let Some(dir) = path.parent().and_then(Path::file_name) {
        let collection = match &record {
            Record::Node(n) => n.collection.as_str(),
            Record::Edge(e) => e.collection.as_str(),
        };
        if dir.to_str() != Some(collection) {
            tracing::warn!(
                path = %path.display(),
                collection,
                "Record stored outside its collection directory"
            );
        }
    }

    Ok(record)
}

fn check_manifest(root: &Path, state: &GraphState) {
    let path = root.join(MANIFEST_FILE);
    if !path.exists() {
        return;
    }
    let manifest: Manifest = match fs::read_to_string(&path)
        .map_err(GraphError::from)
        .and_then(|json| serde_json::from_str(&json).map_err(GraphError::from))
    {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable snapshot manifest");
            return;
        }
    };

    let rebuilt = Manifest::of(state);
    if manifest.node_names != rebuilt.node_names || manifest.edge_names != rebuilt.edge_names {
        tracing::warn!(
            path = %path.display(),
            exported_at = %manifest.exported_at,
            "Snapshot manifest disagrees with records, using records"
        );
    }
}

// ── Dump ──────────────────────────────────────────────────────────

/// Write a full snapshot of `state` under `root`, replacing the previous one.
///
/// Every file is serialized and checked before the disk is touched. The new
/// tree is written to a sibling staging directory and swapped in with
/// renames, so a failed dump leaves the previous snapshot as it was.
pub fn dump(root: &Path, state: &GraphState) -> Result<DumpSummary> {
    let files = plan(root, state)?;
    let (staging, previous) = sibling_dirs(root)?;

    remove_dir_if_present(&staging)?;
    if let Err(e) = write_tree(&staging, &files) {
        discard(&staging);
        return Err(e);
    }
    swap_in(root, &staging, &previous)?;

    let summary = DumpSummary {
        nodes: state.node_count(),
        edges: state.edge_count(),
    };
    tracing::debug!(
        path = %root.display(),
        nodes = summary.nodes,
        edges = summary.edges,
        "Snapshot written"
    );
    Ok(summary)
}

/// One file of a snapshot, relative to the data root.
struct PlannedFile {
    path: PathBuf,
    contents: String,
}

fn plan(root: &Path, state: &GraphState) -> Result<Vec<PlannedFile>> {
    let mut files = Vec::with_capacity(state.node_count() + state.edge_count() + 1);
    let mut taken: HashSet<PathBuf> = HashSet::new();

    let mut add = |collection: &str, id: &str, contents: String| -> Result<()> {
        check_collection(collection).map_err(|e| snapshot_error(root, e.to_string()))?;
        let path = Path::new(collection).join(format!("{}.json", sanitize(id)));
        if !taken.insert(path.clone()) {
            return Err(snapshot_error(
                &root.join(&path),
                "two records map to the same file after sanitizing their ids",
            ));
        }
        files.push(PlannedFile { path, contents });
        Ok(())
    };

    for node in state.nodes() {
        add(&node.collection, node.id.as_str(), serde_json::to_string_pretty(node)?)?;
    }
    for edge in state.edges() {
        add(&edge.collection, edge.id.as_str(), serde_json::to_string_pretty(edge)?)?;
    }

    files.push(PlannedFile {
        path: PathBuf::from(MANIFEST_FILE),
        contents: serde_json::to_string_pretty(&Manifest::of(state))?,
    });
    Ok(files)
}

/// `.{name}.staging` and `.{name}.previous` next to `root`.
fn sibling_dirs(root: &Path) -> Result<(PathBuf, PathBuf)> {
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| snapshot_error(root, "data path must end in a directory name"))?;
    let parent = match root.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    Ok((
        parent.join(format!(".{name}.staging")),
        parent.join(format!(".{name}.previous")),
    ))
}

fn write_tree(dir: &Path, files: &[PlannedFile]) -> Result<()> {
    fs::create_dir_all(dir)?;
    for file in files {
        let path = dir.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.contents)?;
    }
    Ok(())
}

fn swap_in(root: &Path, staging: &Path, previous: &Path) -> Result<()> {
    remove_dir_if_present(previous)?;
    let had_root = root.exists();
    if had_root {
        if let Err(e) = fs::rename(root, previous) {
            discard(staging);
            return Err(e.into());
        }
    }

    if let Err(e) = fs::rename(staging, root) {
        if had_root {
            if let Err(restore) = fs::rename(previous, root) {
                tracing::error!(
                    path = %previous.display(),
                    error = %restore,
                    "Could not restore previous snapshot"
                );
            }
        }
        discard(staging);
        return Err(e.into());
    }

    if had_root {
        if let Err(e) = fs::remove_dir_all(previous) {
            tracing::warn!(path = %previous.display(), error = %e, "Stale snapshot left behind");
        }
    }
    Ok(())
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn discard(dir: &Path) {
    if let Err(e) = remove_dir_if_present(dir) {
        tracing::warn!(path = %dir.display(), error = %e, "Could not remove staging directory");
    }
}

/// Map an identifier to a safe file stem.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainstorm_core::data_from_value;
    use serde_json::json;

    fn sample() -> GraphState {
        let mut state = GraphState::new();
        let a = state
            .insert_node(
                Node::new("company", "600001")
                    .with_id("a")
                    .with_data(data_from_value(json!({"employees": 1000})).unwrap()),
            )
            .unwrap();
        let b = state
            .insert_node(Node::new("person", "alice").with_id("b"))
            .unwrap();
        state
            .insert_edge(Edge::new("invest", "b-invests-a", b, a).with_id("e1").with_weight(7))
            .unwrap();
        state
    }

    #[test]
    fn missing_root_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = load(&dir.path().join("absent")).unwrap();
        assert_eq!(state.node_count(), 0);
        assert_eq!(state.edge_count(), 0);
    }

    #[test]
    fn dump_then_load_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        let state = sample();

        let summary = dump(&root, &state).unwrap();
        assert_eq!(summary, DumpSummary { nodes: 2, edges: 1 });
        assert!(root.join("company/a.json").is_file());
        assert!(root.join("invest/e1.json").is_file());
        assert!(root.join(MANIFEST_FILE).is_file());

        let loaded = load(&root).unwrap();
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.edge_count(), 1);
        let node = loaded.node_by_name("600001").unwrap();
        assert_eq!(node.data["employees"], 1000);
        let edge = loaded.edges().next().unwrap();
        assert_eq!(edge.weight, 7);
        assert_eq!(loaded.edge_names().get("b-invests-a").unwrap().as_str(), "e1");
    }

    #[test]
    fn dump_removes_stale_records() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        let mut state = sample();
        dump(&root, &state).unwrap();

        state.remove_node("alice").unwrap();
        dump(&root, &state).unwrap();

        assert!(!root.join("person/b.json").exists());
        assert!(!root.join("invest/e1.json").exists());
        let loaded = load(&root).unwrap();
        assert_eq!(loaded.node_count(), 1);
        assert_eq!(loaded.edge_count(), 0);
    }

    #[test]
    fn dump_leaves_no_sibling_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        dump(&root, &sample()).unwrap();
        dump(&root, &sample()).unwrap();

        let names: Vec<PathBuf> = sorted_entries(dir.path()).unwrap();
        assert_eq!(names, vec![root]);
    }

    /// Every file under `root`, relative path to contents.
    fn snapshot_bytes(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut out = BTreeMap::new();
        for dir in sorted_entries(root).unwrap() {
            let files = if dir.is_dir() {
                sorted_entries(&dir).unwrap()
            } else {
                vec![dir]
            };
            for file in files {
                let rel = file.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, fs::read(&file).unwrap());
            }
        }
        out
    }

    #[test]
    fn failed_dump_keeps_previous_snapshot_intact() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        let mut state = sample();
        dump(&root, &state).unwrap();
        let before = snapshot_bytes(&root);

        // "x/y" and "x_y" sanitize to the same file name.
        state
            .insert_node(Node::new("company", "first").with_id("x/y"))
            .unwrap();
        state
            .insert_node(Node::new("company", "second").with_id("x_y"))
            .unwrap();
        assert!(matches!(
            dump(&root, &state),
            Err(GraphError::Snapshot { .. })
        ));

        assert_eq!(snapshot_bytes(&root), before);
        assert_eq!(load(&root).unwrap().node_count(), 2);
        assert_eq!(sorted_entries(dir.path()).unwrap(), vec![root]);
    }

    #[test]
    fn edges_load_regardless_of_directory_order() {
        let dir = tempfile::tempdir().unwrap();
        // "aaa" sorts before the node directories.
        fs::create_dir_all(dir.path().join("aaa")).unwrap();
        fs::create_dir_all(dir.path().join("zzz")).unwrap();
        fs::write(
            dir.path().join("aaa/e.json"),
            json!({"id": "e", "relationship": "r", "collection": "aaa", "from": "n", "to": "n"})
                .to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("zzz/n.json"),
            json!({"id": "n", "name": "node", "collection": "zzz"}).to_string(),
        )
        .unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.node_count(), 1);
        assert_eq!(loaded.edge_count(), 1);
    }

    #[test]
    fn unclassifiable_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("misc")).unwrap();
        fs::write(dir.path().join("misc/x.json"), r#"{"id": "x"}"#).unwrap();

        assert!(matches!(load(dir.path()), Err(GraphError::Snapshot { .. })));
    }

    #[test]
    fn dangling_edge_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("r")).unwrap();
        fs::write(
            dir.path().join("r/e.json"),
            json!({"id": "e", "relationship": "r", "collection": "r", "from": "x", "to": "y"})
                .to_string(),
        )
        .unwrap();

        assert!(matches!(
            load(dir.path()),
            Err(GraphError::EndpointNotFound { .. })
        ));
    }

    #[test]
    fn stale_manifest_is_only_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        dump(&root, &sample()).unwrap();
        fs::write(root.join(MANIFEST_FILE), "not json").unwrap();

        assert_eq!(load(&root).unwrap().node_count(), 2);
    }

    #[test]
    fn unsafe_collection_fails_dump_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("db");
        let mut state = sample();
        dump(&root, &state).unwrap();
        let before = snapshot_bytes(&root);

        // Inserts reject this collection; plant it directly.
        state.nodes.insert(
            NodeId::from("n"),
            Node::new("../escape", "n").with_id("n"),
        );
        assert!(matches!(
            dump(&root, &state),
            Err(GraphError::Snapshot { .. })
        ));
        assert_eq!(snapshot_bytes(&root), before);
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn ids_are_sanitized_for_file_names() {
        assert_eq!(sanitize("a/b c"), "a_b_c");
        assert_eq!(sanitize("0f3e-9a_x.1"), "0f3e-9a_x.1");
    }
}
