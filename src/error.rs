// src/error.rs

use thiserror::Error;

/// Core error types for copysolv
#[derive(Error, Debug)]
pub enum Error {
    /// A dependency string could not be parsed into a capability
    #[error("Malformed capability '{input}': {reason}")]
    MalformedCapability { input: String, reason: String },

    /// Both repositories yielded zero usable units
    #[error("Both source and target repositories are empty")]
    EmptyUniverse,

    /// The requested unit name has no candidate in either repository
    #[error("No unit named '{0}' found in source or target repository")]
    NoMatchingUnit(String),

    /// Two units in the closure conflict with one another
    #[error("Units {0} and {1} conflict")]
    ConflictingUnits(String, String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file errors
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Repository metadata could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Repository metadata could not be downloaded
    #[error("Download error: {0}")]
    DownloadError(String),

    /// A unit could not be copied into the target repository
    #[error("Copy error: {0}")]
    CopyError(String),

    /// A copied file does not match its recorded SHA-256
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

impl Error {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Error::MalformedCapability {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using copysolv's Error type
pub type Result<T> = std::result::Result<T, Error>;
