// src/error.rs

//! Unified error handling for the waitlist tracker.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required environment/namespace settings are missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// An archive entry's name does not conform to the path codec
    #[error("Malformed report path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    /// The store holds no snapshot matching the selector
    #[error("No report found matching {selector}")]
    NoReportFound { selector: String },

    /// A transient transfer kept failing until the retry budget ran out
    #[error("{operation} failed after {attempts} attempts: {source}")]
    TransferFailed {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    /// The exact remote path is already occupied
    #[error("Report already exists at {path}")]
    DuplicateReport { path: String },

    /// The raw table or a cell does not match the expected schema
    #[error("Data format error at {context}: {message}")]
    DataFormat { context: String, message: String },

    /// Object-store backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSV decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet encoding/decoding failed
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a malformed path error.
    pub fn malformed_path(path: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a "no report" error for a selector description.
    pub fn no_report(selector: impl Into<String>) -> Self {
        Self::NoReportFound {
            selector: selector.into(),
        }
    }

    /// Create a data format error with the offending location.
    pub fn data_format(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::DataFormat {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage backend error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Network and filesystem faults are transient; codec, selector and
    /// schema failures are not. Neither is a missing or unreadable local
    /// file, which no amount of waiting will fix.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(err) => !matches!(
                err.kind(),
                io::ErrorKind::NotFound
                    | io::ErrorKind::PermissionDenied
                    | io::ErrorKind::InvalidInput
            ),
            Self::Storage(_) | Self::Http(_) => true,
            _ => false,
        }
    }
}
