//! Error types for the hub client.

use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error raised by the reqwest client (connect, DNS, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error raised by any other transport implementation.
    #[error("{0}")]
    Other(String),
}

/// Errors that can occur in hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// An operation was invoked before `configure` succeeded.
    #[error("client is not configured")]
    NotConfigured,

    /// `configure` was called on a client that is already configured.
    #[error("client is already configured")]
    AlreadyConfigured,

    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The hub path is empty or not usable in a URL.
    #[error("invalid hub path: {0}")]
    InvalidHubPath(String),

    /// The token provider produced no token for the request URL.
    #[error("failed to retrieve authorization token")]
    FailedToRetrieveAuthorizationToken,

    /// Non-success status, or a response missing data the protocol requires.
    #[error("unknown hub error: {detail}")]
    Unknown { status: Option<u16>, detail: String },

    /// Network-level failure, passed through verbatim.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response body did not contain the expected registrations.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid token, name or tag.
    #[error(transparent)]
    Types(#[from] nhub_types::Error),
}

impl HubError {
    pub(crate) fn status(status: u16) -> Self {
        HubError::Unknown {
            status: Some(status),
            detail: format!("hub responded with status {status}"),
        }
    }

    pub(crate) fn unknown(detail: impl Into<String>) -> Self {
        HubError::Unknown {
            status: None,
            detail: detail.into(),
        }
    }

    /// HTTP status carried by this error, if the hub responded at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            HubError::Unknown { status, .. } => *status,
            HubError::Transport(TransportError::Http(e)) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the hub reported the registration as gone (410).
    pub fn is_gone(&self) -> bool {
        self.http_status() == Some(410)
    }
}
