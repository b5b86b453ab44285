use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Node,
    Edge,
    Item,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => f.write_str("node"),
            Self::Edge => f.write_str("edge"),
            Self::Item => f.write_str("item"),
        }
    }
}

/// Error type shared by every Chainstorm backend.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: RecordKind, key: String },

    #[error("{kind} name already registered: {name}")]
    DuplicateName { kind: RecordKind, name: String },

    #[error("{kind} with id {id} already exists")]
    AlreadyExists { kind: RecordKind, id: String },

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Edge endpoint node does not exist: {id}")]
    EndpointNotFound { id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot merge key {key:?}: no rule combines {existing} with {incoming}")]
    UnsupportedMergeType {
        key: String,
        existing: &'static str,
        incoming: &'static str,
    },

    #[error("Snapshot error at {}: {reason}", path.display())]
    Snapshot { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GraphError {
    pub fn node_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Node,
            key: key.into(),
        }
    }

    pub fn edge_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            kind: RecordKind::Edge,
            key: key.into(),
        }
    }
}

impl From<config::ConfigError> for GraphError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_record_kind() {
        let err = GraphError::node_not_found("alice");
        assert_eq!(err.to_string(), "node not found: alice");

        let err = GraphError::DuplicateName {
            kind: RecordKind::Edge,
            name: "invest".to_string(),
        };
        assert_eq!(err.to_string(), "edge name already registered: invest");
    }

    #[test]
    fn merge_error_lists_both_types() {
        let err = GraphError::UnsupportedMergeType {
            key: "tags".to_string(),
            existing: "array",
            incoming: "array",
        };
        assert!(err.to_string().contains("\"tags\""));
        assert!(err.to_string().contains("array with array"));
    }
}
