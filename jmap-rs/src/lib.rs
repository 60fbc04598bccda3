//! jmap-rs: JMAP mail client with mailbox analytics
//!
//! An async client for JMAP mail servers (RFC 8620 / RFC 8621) and an
//! analytics engine built on top of it.
//!
//! # Features
//!
//! - **Batched requests**: dependent calls (query then get, create then
//!   submit) travel in one HTTP round trip, chained by typed back-references
//! - **Sending**: draft creation and submission in a single request, with
//!   cleanup of the draft when submission fails
//! - **Batch operations**: bulk read/move/delete with bounded concurrency and
//!   per-item results
//! - **Resilience**: request timeouts, retries for idempotent reads
//! - **Analytics**: volume, top senders, activity histograms, folder usage,
//!   subject heuristics and a text report
//!
//! # Example
//!
//! ```no_run
//! use jmap_rs::{AnalyticsEngine, JmapClient, JmapConfig, ListOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = JmapConfig::new("https://api.fastmail.com/jmap/session", "token");
//!     let client = JmapClient::new(config)?;
//!     client.initialize().await?;
//!
//!     let page = client.list_messages(&ListOptions::default()).await?;
//!     println!("{} of {} messages", page.messages.len(), page.total);
//!
//!     let analytics = AnalyticsEngine::new(&client).compute_for_days(30, 1000, true).await?;
//!     println!("{}", jmap_rs::analytics::format_report(&analytics, 30));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`client`]: High-level mail operations
//! - [`analytics`]: Aggregations and report
//! - [`protocol`]: Request builder and response parsing
//! - [`model`]: Mail objects and filters
//! - [`transport`]: HTTP transport seam

pub mod analytics;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export commonly used types
pub use analytics::{AnalyticsEngine, AnalyticsRequest, AnalyticsResult};
pub use client::{BatchResult, JmapClient, ListOptions, SendOptions};
pub use config::JmapConfig;
pub use error::{JmapError, Result};
