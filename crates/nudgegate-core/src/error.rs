//! Core error types for nudgegate-core.
//!
//! This module defines the error hierarchy using thiserror. Note that the
//! decision gateway itself never returns these: policy rejections are
//! first-class decision outcomes, and persistence failures on counter
//! writes are logged and absorbed. Errors here cover storage, settings
//! validation, and the focus monitor lifecycle.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for nudgegate-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Focus monitor errors
    #[error("Focus monitor error: {0}")]
    Focus(#[from] FocusError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Settings and input validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value for a settings key
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown decision record
    #[error("No decision recorded for request '{0}'")]
    UnknownDecision(String),
}

/// Focus monitor errors.
#[derive(Error, Debug)]
pub enum FocusError {
    /// The host platform has no frontmost-app provider; the monitor
    /// permanently reports itself disabled.
    #[error("focus monitor unsupported on this platform")]
    Unsupported,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
