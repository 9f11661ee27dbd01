// src/error.rs

//! Unified error handling for the collector and analytics engine.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
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

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Analytics input rejected at the boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness violation at the store boundary
    #[error("Conflict: {entity} '{key}' already exists")]
    Conflict { entity: &'static str, key: String },

    /// A conflicting row vanished before it could be re-fetched
    #[error("Store inconsistency: {0}")]
    Inconsistent(String),

    /// Answer written before its question
    #[error("Answer {answer_id} references missing question {question_id}")]
    MissingParent { answer_id: i64, question_id: i64 },

    /// The collection run was cancelled during a pause
    #[error("Collection interrupted")]
    Interrupted,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a uniqueness conflict for the given entity kind.
    pub fn conflict(entity: &'static str, key: impl fmt::Display) -> Self {
        Self::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    /// Create a store inconsistency error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent(message.into())
    }

    /// Whether this error is a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Failure of a single page request against the Q&A API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The source asked us to slow down
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Transport, status or decoding failure
    #[error("transient failure: {0}")]
    Transient(String),
}

impl FetchError {
    /// Create a transient error from anything displayable.
    pub fn transient(message: impl fmt::Display) -> Self {
        Self::Transient(message.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Transient(format!("decode: {err}"))
    }
}
