//! Configuration for mcp-mail-server

use jmap_rs::JmapConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, ServerError};

/// Main server configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
    /// JMAP account
    #[serde(default)]
    pub jmap: JmapConfig,
    /// Analytics defaults for tools that omit them
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:8090")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

/// Analytics configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_days")]
    pub default_days: u32,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_top_senders")]
    pub top_senders: usize,
    /// Fixed offset for hour/day buckets; host local time zone when unset
    pub utc_offset_minutes: Option<i32>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_days() -> u32 {
    30
}

fn default_max_messages() -> usize {
    jmap_rs::analytics::DEFAULT_MAX_MESSAGES
}

fn default_top_senders() -> usize {
    jmap_rs::analytics::DEFAULT_TOP_SENDERS
}

fn default_log_level() -> String {
    "mcp_mail_server=info,jmap_rs=info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_days: default_days(),
            max_messages: default_max_messages(),
            top_senders: default_top_senders(),
            utc_offset_minutes: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ServerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// File (when given) plus process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `JMAP_SESSION_URL`, `JMAP_API_TOKEN`, `JMAP_ACCOUNT_EMAIL` and
    /// `MCP_LISTEN_ADDR` as returned by `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("JMAP_SESSION_URL") {
            self.jmap.session_url = url;
        }
        if let Some(token) = lookup("JMAP_API_TOKEN") {
            self.jmap.api_token = token;
        }
        if let Some(email) = lookup("JMAP_ACCOUNT_EMAIL") {
            self.jmap.account_email = Some(email);
        }
        if let Some(addr) = lookup("MCP_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.jmap
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        self.server.listen_addr.parse::<SocketAddr>().map_err(|e| {
            ServerError::Config(format!(
                "Invalid listen address '{}': {}",
                self.server.listen_addr, e
            ))
        })?;

        if self.analytics.default_days == 0 {
            return Err(ServerError::Config(
                "analytics.default_days must be at least 1".to_string(),
            ));
        }
        if self.analytics.max_messages == 0 {
            return Err(ServerError::Config(
                "analytics.max_messages must be at least 1".to_string(),
            ));
        }

        if let Some(minutes) = self.analytics.utc_offset_minutes {
            if minutes.abs() >= 24 * 60 {
                return Err(ServerError::Config(format!(
                    "analytics.utc_offset_minutes out of range: {}",
                    minutes
                )));
            }
        }

        Ok(())
    }
}
