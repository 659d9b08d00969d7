//! Error handling for the cardlink client

use std::fmt;
use thiserror::Error;

/// Unified error type for the cardlink client
#[derive(Error, Debug)]
pub enum Error {
    /// The requested profile does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network, timeout or server-side failure
    #[error("Request failed: {0}")]
    Transient(String),

    /// Rejected input, either client-side or with a server-supplied message
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local key-value store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// The user-facing error categories every [`Error`] folds into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Record absent; rendered as a distinct empty state
    NotFound,
    /// Network or parse failure; rendered as a generic failure message
    Transient,
    /// Rejected input; rendered inline next to the form
    Validation,
}

impl Error {
    /// Create a new not-found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new transient error
    pub fn transient<T: fmt::Display>(msg: T) -> Self {
        Error::Transient(msg.to_string())
    }

    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Category this error is surfaced as
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) | Error::Config(_) | Error::Url(_) => ErrorKind::Validation,
            Error::Transient(_) | Error::Storage(_) | Error::Http(_) | Error::Json(_) => {
                ErrorKind::Transient
            }
        }
    }

    /// Whether the error means the record does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
