//! Client error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for operation calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures of the underlying event-channel socket.
///
/// These never reach callers of operations: the reconnecting channel absorbs
/// them and retries.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket could not be opened.
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Read or write on an open socket failed.
    #[error("WebSocket I/O error: {0}")]
    Io(String),

    /// The socket is already closed.
    #[error("Connection closed")]
    Closed,
}

/// Outcome of a failed operation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The operation's class deadline elapsed first.
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The caller abandoned the operation, or the server confirmed it was
    /// cancelled (status 499).
    #[error("Request cancelled")]
    Cancelled,

    /// The connection dropped while the request was in flight.
    #[error("Connection lost before the request completed: {0}")]
    Disconnected(String),

    /// The server answered with an error status. `detail` is shown verbatim.
    #[error("{detail}")]
    Operation { status: u16, detail: String },

    /// The server could not be reached at all.
    #[error("Network error: {0}")]
    Network(String),

    /// A success response had an unexpected body.
    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Deliberate abandonment rather than a fault. UIs should not show an
    /// error for these.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Disconnected(_))
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Network(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else {
            Self::Disconnected(err.to_string())
        }
    }
}
