//! Error types for Dropbox provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Dropbox provider errors
#[derive(Error, Debug)]
pub enum DropboxError {
    /// Access token missing, expired or revoked
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Dropbox API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limit still exceeded after retries
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Path does not exist
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Dropbox operations
pub type Result<T> = std::result::Result<T, DropboxError>;

impl From<DropboxError> for BridgeError {
    fn from(error: DropboxError) -> Self {
        match error {
            DropboxError::PathNotFound { path } => BridgeError::NotFound(path),
            DropboxError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
