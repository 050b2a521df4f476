//! Error types for the fog-of-war sync core.

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that stop the orchestrator before or outside a sync pass.
///
/// Per-target failures inside a pass are not errors at this level; they are
/// recorded in the pass report.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Save root missing or not a directory.
    #[error("save root not found: {0}")]
    SaveRootNotFound(String),

    /// A pass could not be run to completion.
    #[error("sync pass failed: {0}")]
    PassFailed(String),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    NotFound(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid.
    #[error("invalid configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// INI configuration file is not valid.
    #[error("invalid configuration file {path}: {source}")]
    IniParse {
        path: String,
        #[source]
        source: ini::ParseError,
    },

    /// A required section or key is absent.
    #[error("missing {what} in configuration file {path}")]
    Missing { path: String, what: String },

    /// Configured save path does not exist.
    #[error("save path does not exist: {0}")]
    SavePathNotFound(String),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The executable's directory could not be determined.
    #[error("could not locate executable directory: {0}")]
    ExecutableDir(#[source] std::io::Error),
}
