//! HTTP transport for JMAP
//!
//! The client talks to the server only through the [`Transport`] trait so the
//! whole protocol layer can run against an in-memory server in tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::JmapConfig;
use crate::error::{JmapError, Result};
use crate::protocol::{Request, Response};

/// Carries session discovery and API requests to a JMAP server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the raw session document
    async fn fetch_session(&self) -> Result<Value>;

    /// POST a batched request to the API endpoint
    async fn execute(&self, api_url: &str, request: &Request) -> Result<Response>;
}

/// reqwest-backed transport with bearer authentication and a request timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    session_url: String,
    api_token: String,
}

impl HttpTransport {
    pub fn new(config: &JmapConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("jmap-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| JmapError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            session_url: config.session_url.clone(),
            api_token: config.api_token.clone(),
        })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        check_status(response.status())?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            JmapError::protocol(
                format!("Response is not valid JSON: {}", e),
                Value::String(body),
            )
        })
    }
}

/// Map an HTTP status to a transport error, if it is one
fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
    let message = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("Authentication rejected ({})", status)
        }
        StatusCode::TOO_MANY_REQUESTS => "Rate limited by server (429)".to_string(),
        _ => format!("Unexpected HTTP status {}", status),
    };

    Err(JmapError::Transport { message, retryable })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_session(&self) -> Result<Value> {
        debug!("Fetching JMAP session from {}", self.session_url);

        let response = self
            .client
            .get(&self.session_url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn execute(&self, api_url: &str, request: &Request) -> Result<Response> {
        debug!(
            "POST {} with {} method call(s)",
            api_url,
            request.method_calls.len()
        );

        let response = self
            .client
            .post(api_url)
            .bearer_auth(&self.api_token)
            .json(request)
            .send()
            .await?;

        let body = Self::read_json(response).await?;
        serde_json::from_value(body.clone())
            .map_err(|e| JmapError::protocol(format!("Malformed JMAP response: {}", e), body))
    }
}
