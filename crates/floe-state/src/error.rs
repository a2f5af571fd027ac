//! Error types for floe-state operations.

use crate::Path;
use thiserror::Error;

/// Result type alias for floe-state operations.
pub type FloeResult<T> = Result<T, FloeError>;

/// Errors that can occur during floe-state operations.
///
/// Ordinary workflow does not error: clone and merge are total, dispatch
/// of any well-formed action succeeds. Errors come from draft writes that
/// contradict the shape of the tree and from name lookups on the
/// container surface.
#[derive(Debug, Error)]
pub enum FloeError {
    /// Path does not exist in the tree.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The path that was not found.
        path: Path,
    },

    /// Sequence index is out of bounds.
    #[error("index {index} out of bounds (len: {len}) at path {path}")]
    IndexOutOfBounds {
        /// The path to the sequence.
        path: Path,
        /// The index that was accessed.
        index: usize,
        /// The actual length of the sequence.
        len: usize,
    },

    /// Type mismatch when writing through a draft.
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The path where the mismatch occurred.
        path: Path,
        /// The expected type.
        expected: &'static str,
        /// The actual type found.
        found: &'static str,
    },

    /// No mutation registered under this name.
    #[error("unknown mutation: {name}")]
    UnknownMutation {
        /// The requested mutation name.
        name: String,
    },

    /// No selector registered under this name.
    #[error("unknown selector: {name}")]
    UnknownSelector {
        /// The requested selector name.
        name: String,
    },

    /// A container is already registered under this name.
    #[error("container already registered: {name}")]
    ContainerExists {
        /// The conflicting registry name.
        name: String,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FloeError {
    /// Create a path not found error.
    #[inline]
    pub fn path_not_found(path: Path) -> Self {
        FloeError::PathNotFound { path }
    }

    /// Create an index out of bounds error.
    #[inline]
    pub fn index_out_of_bounds(path: Path, index: usize, len: usize) -> Self {
        FloeError::IndexOutOfBounds { path, index, len }
    }

    /// Create a type mismatch error.
    #[inline]
    pub fn type_mismatch(path: Path, expected: &'static str, found: &'static str) -> Self {
        FloeError::TypeMismatch {
            path,
            expected,
            found,
        }
    }

    /// Create an unknown mutation error.
    #[inline]
    pub fn unknown_mutation(name: impl Into<String>) -> Self {
        FloeError::UnknownMutation { name: name.into() }
    }

    /// Create an unknown selector error.
    #[inline]
    pub fn unknown_selector(name: impl Into<String>) -> Self {
        FloeError::UnknownSelector { name: name.into() }
    }

    /// Create a container exists error.
    #[inline]
    pub fn container_exists(name: impl Into<String>) -> Self {
        FloeError::ContainerExists { name: name.into() }
    }
}
