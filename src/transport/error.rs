use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to a remote store.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Trust store, client identity or base URL could not be loaded.
    #[error("TLS/security configuration error: {0}")]
    SecurityConfiguration(String),

    /// DNS resolution or connection establishment failed.
    #[error("Connection error: {0}")]
    Connect(#[source] reqwest::Error),

    /// The bounded connect or request timeout expired.
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The store answered with a non-success status. The body is kept intact.
    #[error("Remote store returned {status}: {body}")]
    Remote { status: StatusCode, body: String },
}

impl TransportError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        // Connect timeouts report both flags; the timeout is the actionable part
        if err.is_timeout() {
            TransportError::Timeout(err)
        } else if err.is_connect() {
            TransportError::Connect(err)
        } else {
            TransportError::Request(err)
        }
    }

    /// Status code of a remote failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the same call could succeed if repeated later.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Connect(_) | TransportError::Timeout(_) => true,
            TransportError::Remote { status, .. } => matches!(
                *status,
                StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
                    | StatusCode::TOO_MANY_REQUESTS
            ),
            TransportError::SecurityConfiguration(_) | TransportError::Request(_) => false,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
