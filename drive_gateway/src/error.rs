//! Error types for the drive_gateway crate.

use thiserror::Error;

/// Errors that can occur when talking to a drive backend.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Failed to read credentials file: {0}")]
    CredentialsFileError(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid upload request: {0}")]
    UploadRejected(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;

/// A backend failure surfaced by the manager, tagged with the action that failed.
#[derive(Error, Debug)]
#[error("{action}: {source}")]
pub struct OperationError {
    pub action: &'static str,
    #[source]
    pub source: DriveError,
}

impl OperationError {
    pub fn new(action: &'static str, source: DriveError) -> Self {
        Self { action, source }
    }
}
