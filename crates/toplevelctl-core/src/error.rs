//! Error types for toplevelctl-core.

use std::path::PathBuf;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading settings or rendering snapshots.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Failed to read the config file.
    #[error("failed to read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are out of range.
    #[error("config validation failed:\n{}", .0.join("\n"))]
    ConfigValidation(Vec<String>),

    /// Snapshot could not be encoded as JSON.
    #[error("failed to encode snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}
