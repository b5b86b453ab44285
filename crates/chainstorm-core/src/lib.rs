//! chainstorm-core: Shared types, configuration, and error handling for Chainstorm.
//!
//! This crate provides the foundations every graph backend builds on:
//! - Node and edge records with an open JSON data mapping
//! - The `GraphItem` sum type used at the record-kind boundary
//! - The `GraphHandler` trait: one CRUD + traversal contract for all backends
//! - Configuration loading
//! - The shared error taxonomy

pub mod config;
pub mod error;
pub mod handler;
pub mod types;

pub use config::{LogConfig, StoreConfig};
pub use error::{GraphError, RecordKind, Result};
pub use handler::GraphHandler;
pub use types::{
    data_from_value, Data, Direction, Edge, EdgeId, GraphItem, Node, NodeId, RelatedEdge,
};
