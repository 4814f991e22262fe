//! Error types for the Music Time plugin.
//!
//! Component-level errors ([`ConfigError`], [`OfflineStoreError`],
//! [`ClientError`]) live beside the code that raises them and convert into
//! [`PluginError`] for callers that only need to report a failure.

use thiserror::Error;

use crate::clients::ClientError;
use crate::config::ConfigError;
use crate::offline::OfflineStoreError;

/// Errors that can occur during plugin operations.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Offline queue error.
    #[error("offline store error: {0}")]
    OfflineStore(#[from] OfflineStoreError),

    /// Backend or player client error.
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

/// A specialized `Result` type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;
