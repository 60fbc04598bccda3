//! mcp-mail-server: MCP tools over a JMAP mailbox
//!
//! Exposes [`jmap_rs`] mail operations and analytics to AI assistants
//! through the Model Context Protocol (JSON-RPC 2.0 over HTTP).
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`server`]: axum router for `/mcp` and health checks
//! - [`tools`]: tool catalog, typed arguments and execution

pub mod config;
pub mod error;
pub mod mcp;
pub mod server;
pub mod state;
pub mod tools;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::router;
pub use state::AppState;
