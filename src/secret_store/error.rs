use reqwest::StatusCode;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Writes are only allowed over a mutually authenticated channel.
    #[error("{operation} requires a client-authenticated (mTLS) transport")]
    MutualTlsRequired { operation: &'static str },

    #[error("invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error("failed to decode {what} response: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl SecretStoreError {
    /// HTTP status of a remote failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SecretStoreError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }
}

pub type SecretStoreResult<T> = Result<T, SecretStoreError>;
