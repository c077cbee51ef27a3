use thiserror::Error;

/// Errors raised while dispatching a request or decoding its response.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP client failed (connection, timeout, TLS).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote service answered with a non-success status.
    #[error("{url} returned HTTP {status}: {message}")]
    RemoteCallFailure {
        status: u16,
        url: String,
        message: String,
    },

    /// The request body could not be serialized.
    #[error("failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The response body could not be decoded into the declared type.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The request's cancellation token fired before a response arrived.
    #[error("request cancelled")]
    Cancelled,
}

impl ClientError {
    /// The HTTP status, if the failure came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteCallFailure { status, .. } => Some(*status),
            Self::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure is transient (timeouts, connection errors, 5xx, 429).
    ///
    /// Generated clients never retry; this is for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(err) => err.is_timeout() || err.is_connect(),
            Self::RemoteCallFailure { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
