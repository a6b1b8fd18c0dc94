//! Error types for snapdiff_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using snapdiff_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during repository and diff operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Writing diff output failed.
    #[error("writing output: {source}")]
    Output {
        #[source]
        source: std::io::Error,
    },

    /// Wrong command arguments (checked before the repository is touched).
    #[error("{reason}")]
    Argument { reason: String },

    /// Repository is invalid or not initialized.
    #[error("Invalid repository at {path}: {reason}")]
    InvalidRepository { path: PathBuf, reason: String },

    /// A lookup was attempted before `load_index` was called.
    #[error("Repository index not loaded")]
    IndexNotLoaded,

    /// Another process holds the repository lock.
    #[error("Repository is already locked: {path}")]
    RepositoryLocked { path: PathBuf },

    /// Object file is corrupted or invalid.
    #[error("Corrupted object at {path}: {reason}")]
    CorruptedObject { path: PathBuf, reason: String },

    /// Invalid hash format or encoding.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Object not found in repository.
    #[error("Object not found: {hash}")]
    ObjectNotFound { hash: String },

    /// Invalid object type.
    #[error("Invalid object type: expected {expected}, got {got}")]
    InvalidObjectType { expected: String, got: String },

    /// Object header could not be parsed.
    #[error("Invalid object header: {reason}")]
    InvalidHeader { reason: String },

    /// Tree or snapshot payload failed to encode or decode.
    #[error("Payload decode error: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    /// Invalid node inside a tree.
    #[error("Invalid node: {reason}")]
    InvalidNode { reason: String },

    /// Compression or decompression failed.
    #[error("Compression error: {reason}")]
    Compression { reason: String },

    /// A snapshot descriptor did not resolve to any snapshot.
    #[error("no matching snapshot found for {desc:?}")]
    SnapshotNotFound { desc: String },

    /// A snapshot descriptor matched more than one snapshot.
    #[error("snapshot descriptor {desc:?} is ambiguous ({matches} matches)")]
    AmbiguousSnapshot { desc: String, matches: usize },

    /// A resolved snapshot has no root tree.
    #[error("snapshot {id} has nil tree")]
    SnapshotHasNoTree { id: String },

    /// A tree could not be loaded.
    #[error("loading tree {hash}: {source}")]
    TreeLoad {
        hash: String,
        #[source]
        source: Box<Error>,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid reference name or format.
    #[error("Invalid reference: {reason}")]
    InvalidRef { reason: String },

    /// Reference not found.
    #[error("Reference not found: {name}")]
    RefNotFound { name: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

impl Error {
    /// Create an Argument error.
    pub fn argument(reason: impl Into<String>) -> Self {
        Error::Argument {
            reason: reason.into(),
        }
    }

    /// Create an InvalidRepository error.
    pub fn invalid_repository(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidRepository {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a RepositoryLocked error.
    pub fn repository_locked(path: impl Into<PathBuf>) -> Self {
        Error::RepositoryLocked { path: path.into() }
    }

    /// Create a CorruptedObject error.
    pub fn corrupted_object(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedObject {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an ObjectNotFound error.
    pub fn object_not_found(hash: impl Into<String>) -> Self {
        Error::ObjectNotFound { hash: hash.into() }
    }

    /// Create an InvalidObjectType error.
    pub fn invalid_object_type(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::InvalidObjectType {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create an InvalidHeader error.
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            reason: reason.into(),
        }
    }

    /// Create an InvalidNode error.
    pub fn invalid_node(reason: impl Into<String>) -> Self {
        Error::InvalidNode {
            reason: reason.into(),
        }
    }

    /// Create a Compression error.
    pub fn compression(reason: impl Into<String>) -> Self {
        Error::Compression {
            reason: reason.into(),
        }
    }

    /// Create a SnapshotNotFound error.
    pub fn snapshot_not_found(desc: impl Into<String>) -> Self {
        Error::SnapshotNotFound { desc: desc.into() }
    }

    /// Create a SnapshotHasNoTree error.
    pub fn snapshot_has_no_tree(id: impl Into<String>) -> Self {
        Error::SnapshotHasNoTree { id: id.into() }
    }

    /// Wrap a failure to load the tree with the given hash.
    pub fn tree_load(hash: impl Into<String>, source: Error) -> Self {
        Error::TreeLoad {
            hash: hash.into(),
            source: Box::new(source),
        }
    }

    /// Create an InvalidRef error.
    pub fn invalid_ref(reason: impl Into<String>) -> Self {
        Error::InvalidRef {
            reason: reason.into(),
        }
    }

    /// Create a RefNotFound error.
    pub fn ref_not_found(name: impl Into<String>) -> Self {
        Error::RefNotFound { name: name.into() }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}
