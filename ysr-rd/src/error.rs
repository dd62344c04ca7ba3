//! Error types for ysr-rd
//!
//! Every failure in the reading desk degrades to an inert state; none of these
//! is fatal to the process.

use thiserror::Error;

/// Main error type for the reading desk
#[derive(Error, Debug)]
pub enum Error {
    /// Store, configuration or model errors from ysr-common
    #[error(transparent)]
    Common(#[from] ysr_common::Error),

    /// Audio reference could not be fetched, read, or decoded
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid state for operation (e.g. no article open)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Convenience Result type using ysr-rd Error
pub type Result<T> = std::result::Result<T, Error>;
