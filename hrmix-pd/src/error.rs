//! Error types for hrmix-pd
//!
//! Defines crate-specific error types using thiserror for clear error propagation.
//! Engine conditions that are recoverable by design (empty pool, dispatch
//! failures) are reported as events, not returned as errors.

use thiserror::Error;

/// Main error type for hrmix-pd
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Zone table breakpoints are not ordered, contiguous or monotonic
    #[error("Invalid zone table: {0}")]
    InvalidZoneTable(String),

    /// Sensor payload could not be decoded
    #[error("Invalid heart rate measurement: {0}")]
    InvalidMeasurement(String),

    /// Playlist file could not be used
    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    /// Errors from the shared crate (io, toml, json, models)
    #[error(transparent)]
    Common(#[from] hrmix_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type using hrmix-pd Error
pub type Result<T> = std::result::Result<T, Error>;
