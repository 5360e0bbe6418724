//! Common error types for hrmix

use thiserror::Error;

/// Common result type for hrmix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across hrmix crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML document could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON document could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid track identifier or URI
    #[error("Invalid track id: {0}")]
    InvalidTrackId(String),

    /// Audio features outside their documented ranges
    #[error("Invalid audio features for {track}: {reason}")]
    InvalidFeatures { track: String, reason: String },
}
