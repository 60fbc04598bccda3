//! mcp-mail-server binary

use anyhow::Context;
use jmap_rs::JmapClient;
use mcp_mail_server::config::{Config, LogFormat, LoggingConfig};
use mcp_mail_server::{router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config path from argv, then MCP_MAIL_CONFIG; environment-only otherwise
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MCP_MAIL_CONFIG").ok())
        .map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;
    init_logging(&config.logging);

    info!("🚀 Starting mcp-mail-server...");
    if let Some(path) = &config_path {
        info!("📄 Loaded configuration from {}", path.display());
    }
    config.validate()?;

    let client = JmapClient::new(config.jmap.clone())?;
    client
        .initialize()
        .await
        .context("JMAP session initialization failed")?;
    info!("📧 Connected to JMAP account {}", client.account_id()?);

    let state = Arc::new(AppState::new(Arc::new(client), config.analytics.clone()));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!("🌐 MCP server listening on http://{}", config.server.listen_addr);
    info!(
        "📋 Available tools: {}",
        mcp_mail_server::tools::catalog().len()
    );

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
