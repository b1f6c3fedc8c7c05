//! Typed errors callers need to match on
//!
//! Everything else is carried as `anyhow::Error` with context.

/// Errors raised by content stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found: {0}")]
    UserNotFound(String),
}

/// The user's stored credential cannot produce a usable access token
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("user {0} has no refresh token and the access token has expired")]
    MissingRefreshToken(String),
    #[error("token refresh rejected for user {user}: {reason}")]
    RefreshRejected { user: String, reason: String },
}

/// Upload request validation failures
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No files were sent.")]
    NoFiles,
    #[error("None of the uploaded files has a supported extension.")]
    NoSupportedFiles,
}

/// Document pipeline failures surfaced on the task record
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Could not extract text from document.")]
    NoTextExtracted,
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
}
