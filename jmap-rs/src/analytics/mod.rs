//! Mailbox analytics
//!
//! [`AnalyticsEngine`] fetches the messages of a time window once through a
//! [`JmapClient`](crate::JmapClient) and derives volume, sender ranking,
//! activity histograms, folder usage, content heuristics and unread metrics.

pub mod aggregate;
mod engine;
pub mod report;
mod types;

pub use aggregate::BucketZone;
pub use engine::AnalyticsEngine;
pub use report::{format_report, recommendations};
pub use types::*;
