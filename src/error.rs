//! Error types for configuration, snapshot decoding and remote persistence.
//!
//! Graph mutations never produce errors (stale references are reported through
//! sentinel return values instead), so everything here belongs to an I/O edge.

use thiserror::Error;

/// Failures talking to the remote diagram store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure (connection refused, timeout, TLS, ...)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success HTTP status
    #[error("server returned status {status}")]
    Status {
        /// The HTTP status code received
        status: u16,
    },
    /// The server processed the request but reported `success: false`
    #[error("save rejected: {0}")]
    Rejected(String),
    /// The response body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The in-memory store was told to fail (tests and offline mode)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures resolving the editor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`crate::config::EditorConfig`]
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was parsed
        path: String,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },
    /// A value failed validation after all sources were merged
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures converting a snapshot to or from JSON text.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Malformed JSON or a shape mismatch
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
