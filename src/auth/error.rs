use thiserror::Error;

use super::DirectoryError;

/// Identity resolution failures.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No directory entry matched the username.
    #[error("user not found: {0}")]
    NotFound(String),

    /// The directory could not be queried. Retryable.
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(#[from] DirectoryError),

    /// Several entries matched and the match policy forbids choosing.
    #[error("username '{username}' matched {matches} directory entries")]
    AmbiguousIdentity { username: String, matches: usize },

    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),
}

impl IdentityError {
    /// Whether retrying the same lookup may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IdentityError::DirectoryUnavailable(_))
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;
