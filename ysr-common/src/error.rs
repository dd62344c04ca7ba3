//! Common error types for YaSong Reader

use thiserror::Error;

/// Common result type for ysr operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the store facade, configuration and model
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted record or payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure talking to the remote backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote backend answered with an error status
    #[error("Remote store error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
