//! Error types for quill-storage.

use std::path::PathBuf;
use thiserror::Error;

use crate::history::HistoryError;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Project not found.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Key cannot be mapped to a storage location.
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Invalid path.
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    /// Home directory not found.
    #[error("Could not determine home/data directory")]
    HomeDirNotFound,

    /// Outline history refused a move.
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
