/*
[INPUT]:  Error sources (HTTP, API, serialization, auth, WebSocket, listeners)
[OUTPUT]: Structured error type with a closed classification for recovery decisions
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing how the supervisor classifies failures
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Boxed error returned by caller-supplied listeners
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the Alor adapter
#[derive(Error, Debug)]
pub enum AlorError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status, or a command was rejected
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Token acquisition failed
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Socket could not be opened, or failed while open
    #[error("WebSocket connection error: {0}")]
    Connection(String),

    /// Operation did not complete in time
    #[error("Timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Inbound frame could not be understood
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Subscription id is not registered
    #[error("Subscription not found: {guid}")]
    NotFound { guid: String },

    /// Request is malformed and was never sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A listener returned an error or panicked
    #[error("Listener failed: {0}")]
    Handler(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The streaming client was shut down
    #[error("Streaming client cancelled")]
    Cancelled,
}

/// Closed classification the supervisor branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Protocol,
    Application,
    Contract,
    Cancelled,
}

impl AlorError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AlorError::Http(err) if err.is_timeout() => ErrorKind::Timeout,
            AlorError::Http(_) | AlorError::Connection(_) | AlorError::UrlParse(_) => {
                ErrorKind::Connection
            }
            AlorError::Timeout { .. } => ErrorKind::Timeout,
            AlorError::Serialization(_) | AlorError::Protocol(_) => ErrorKind::Protocol,
            AlorError::Api { .. }
            | AlorError::Authentication { .. }
            | AlorError::InvalidRequest(_)
            | AlorError::Handler(_)
            | AlorError::Config(_) => ErrorKind::Application,
            AlorError::NotFound { .. } => ErrorKind::Contract,
            AlorError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Check if the error is recovered by reconnecting
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection | ErrorKind::Timeout)
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        match self {
            AlorError::Authentication { .. } => true,
            AlorError::Api { code, .. } => *code == 401 || *code == 403,
            _ => false,
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        AlorError::Api {
            code: status.as_u16(),
            message: message.into(),
        }
    }

    pub(crate) fn timeout(duration: std::time::Duration) -> Self {
        AlorError::Timeout {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AlorError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AlorError::Connection(err.to_string())
    }
}

/// Result type alias for Alor operations
pub type Result<T> = std::result::Result<T, AlorError>;
