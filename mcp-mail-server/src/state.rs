//! Shared application state

use chrono::FixedOffset;
use jmap_rs::{AnalyticsEngine, JmapClient};
use std::sync::Arc;
use tracing::warn;

use crate::config::AnalyticsConfig;

/// Built once in `main`, shared by every request
pub struct AppState {
    pub client: Arc<JmapClient>,
    pub analytics: AnalyticsConfig,
}

impl AppState {
    pub fn new(client: Arc<JmapClient>, analytics: AnalyticsConfig) -> Self {
        Self { client, analytics }
    }

    /// Analytics over the shared client, in the configured offset when set
    pub fn analytics_engine(&self) -> AnalyticsEngine<'_> {
        let engine = AnalyticsEngine::new(&self.client);
        match self.analytics.utc_offset_minutes {
            Some(minutes) => match FixedOffset::east_opt(minutes * 60) {
                Some(offset) => engine.with_utc_offset(offset),
                None => {
                    warn!("⚠️  Ignoring out-of-range UTC offset: {} minutes", minutes);
                    engine
                }
            },
            None => engine,
        }
    }
}
