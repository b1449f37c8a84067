//! Custom error types for the profile store.
//!
//! This module separates caller mistakes (validation) from failures of the
//! collaborators the store talks to (key-value storage, S3, identity
//! provider, runtime messaging).

use thiserror::Error;

/// Main error type for profile store operations.
///
/// A missing profile or default pointer is never an error; those operations
/// return `Option::None` instead.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Caller-supplied input violates a precondition.
    #[error("{0}")]
    Validation(String),

    /// The underlying key-value store rejected an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Reading a user-supplied file failed.
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Fetching an object from S3 failed.
    #[error("Error fetching S3 file content: {0}")]
    ObjectFetch(String),

    /// Fetched object is not valid UTF-8 text.
    #[error("S3 object is not valid UTF-8 text")]
    InvalidUtf8,

    /// Identity provider refused or failed the sign-in.
    #[error("Error during Cognito sign in: {0}")]
    Auth(String),

    /// A runtime message could not be delivered.
    #[error("Failed to send data: {0}")]
    Delivery(String),
}

impl SyncError {
    /// Shorthand for building a [`SyncError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    /// Shorthand for building a [`SyncError::Storage`].
    pub fn storage(message: impl Into<String>) -> Self {
        SyncError::Storage(message.into())
    }

    /// True for errors caused by caller input rather than a collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }
}

/// Result type alias for profile store operations.
pub type Result<T> = std::result::Result<T, SyncError>;
