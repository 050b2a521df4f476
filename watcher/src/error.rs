//! Error types for the save watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur in the save watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Save root not found.
    #[error("save root not found: {0}")]
    SaveRootNotFound(String),

    /// Save root exists but is not a directory.
    #[error("save root is not a directory: {0}")]
    NotADirectory(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}
