//! chainstorm-local: In-memory graph store for Chainstorm.
//!
//! Keeps every node and edge in ordered maps behind a single reader-writer
//! lock, indexes names in both directions, and runs breadth-first and
//! depth-first traversals over out-edges. State is loaded from and written
//! back to a directory of pretty-printed JSON documents on connect and
//! disconnect.

pub mod merge;
pub mod registry;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod traversal;

pub use registry::NameRegistry;
pub use snapshot::{DumpSummary, Manifest, MANIFEST_FILE};
pub use state::{DataMode, GraphState};
pub use store::{GraphStats, InMemoryGraph, NodePath};
pub use traversal::{EdgeScope, WeightedPath};
