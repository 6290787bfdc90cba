//! Site read errors.

use std::path::PathBuf;

use quire_config::ConfigError;
use quire_document::DocumentError;

/// Error returned when a site cannot be read.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A document failed to load or parse.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// A directory or file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A background read task panicked or was cancelled.
    #[error("Background read task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Error loading a single data file.
///
/// Never fatal: the site logs it and leaves the key out of `site.data`.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// File could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed YAML.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Malformed JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed CSV or TSV.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    /// Extension with no data reader.
    #[error("Unsupported data file extension: {0}")]
    Unsupported(String),
}
