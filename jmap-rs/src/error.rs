//! Error types for jmap-rs

use thiserror::Error;

/// Result type alias for JMAP operations
pub type Result<T> = std::result::Result<T, JmapError>;

/// JMAP client error types
#[derive(Error, Debug)]
pub enum JmapError {
    /// Missing credentials or no resolvable primary mail account
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The session document could not be fetched or parsed
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// An operation was invoked before `initialize()` succeeded
    #[error("JMAP client is not initialized; call initialize() first")]
    Uninitialized,

    /// Network failure, timeout or non-2xx HTTP status
    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// Well-formed HTTP response with an unexpected shape
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        payload: serde_json::Value,
    },

    /// The server answered a method call with an `error` response
    #[error("JMAP method {method} failed: {error_type} ({description})")]
    Method {
        method: String,
        error_type: String,
        description: String,
    },

    /// No mailbox carries the requested role
    #[error("No mailbox with role '{0}'")]
    MailboxNotFound(String),

    /// No sending identity matches
    #[error("No sending identity found for {0}")]
    IdentityNotFound(String),

    /// The referenced object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The draft-and-send sequence failed
    #[error("Send failed: {0}")]
    Send(String),

    /// Caller supplied arguments that cannot be turned into a request
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl JmapError {
    /// Build a protocol error carrying the raw server payload
    pub fn protocol(message: impl Into<String>, payload: serde_json::Value) -> Self {
        JmapError::Protocol {
            message: message.into(),
            payload,
        }
    }

    /// Whether an idempotent read may be retried after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, JmapError::Transport { retryable: true, .. })
    }
}

impl From<reqwest::Error> for JmapError {
    fn from(err: reqwest::Error) -> Self {
        let retryable = err.is_timeout()
            || err.is_connect()
            || err
                .status()
                .map(|s| s.is_server_error() || s.as_u16() == 429)
                .unwrap_or(false);

        JmapError::Transport {
            message: err.to_string(),
            retryable,
        }
    }
}
