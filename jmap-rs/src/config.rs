//! Configuration for the JMAP client

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{JmapError, Result};

/// JMAP account and transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JmapConfig {
    /// Session discovery URL (e.g. "https://api.fastmail.com/jmap/session")
    #[serde(default = "default_session_url")]
    pub session_url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: String,
    /// Address of the account owner; falls back to the session username
    pub account_email: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// Retries for idempotent reads on retryable transport failures
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
    /// Upper bound on in-flight requests during batch operations
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

fn default_session_url() -> String {
    "https://api.fastmail.com/jmap/session".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_read_retries() -> u32 {
    2
}

fn default_max_concurrent() -> usize {
    4
}

impl JmapConfig {
    /// Create a configuration with default transport settings
    pub fn new(session_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            session_url: session_url.into(),
            api_token: api_token.into(),
            account_email: None,
            request_timeout_seconds: default_timeout(),
            read_retries: default_read_retries(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }

    pub fn with_account_email(mut self, email: impl Into<String>) -> Self {
        self.account_email = Some(email.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(JmapError::Configuration("API token is missing".to_string()));
        }

        if !self.session_url.starts_with("http://") && !self.session_url.starts_with("https://") {
            return Err(JmapError::Configuration(format!(
                "Invalid session URL '{}'",
                self.session_url
            )));
        }

        if self.request_timeout_seconds == 0 {
            return Err(JmapError::Configuration(
                "request_timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if self.max_concurrent_requests == 0 {
            return Err(JmapError::Configuration(
                "max_concurrent_requests must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for JmapConfig {
    fn default() -> Self {
        Self::new(default_session_url(), "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_is_rejected() {
        let config = JmapConfig::default();
        assert!(matches!(config.validate(), Err(JmapError::Configuration(_))));
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
session_url = "https://jmap.example.com/session"
api_token = "secret"
account_email = "me@example.com"
"#;
        let config: JmapConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.session_url, "https://jmap.example.com/session");
        assert_eq!(config.account_email.as_deref(), Some("me@example.com"));
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.max_concurrent_requests, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_session_url() {
        let config = JmapConfig::new("ftp://example.com", "token");
        assert!(config.validate().is_err());
    }
}
