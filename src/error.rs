//! Error types for zp-records

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Store-level failure: statement, transaction or commit error
    #[error("Database error: {0}")]
    Database(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecordsError {
    /// Wrap a rusqlite error with the step that produced it
    pub fn db(context: &str, err: rusqlite::Error) -> Self {
        RecordsError::Database(format!("{}: {}", context, err))
    }
}
