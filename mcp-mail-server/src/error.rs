//! Error types for mcp-mail-server

use jmap_rs::JmapError;
use thiserror::Error;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mail server error
    #[error("{0}")]
    Jmap(#[from] JmapError),

    /// Payload could not be rendered
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tool arguments failed to parse or validate
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// No tool with this name in the catalog
    #[error("Tool not found: {0}")]
    UnknownTool(String),
}
