mod config;
mod event;
mod relay;
mod server;
mod source;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::relay::RelayEngine;
use crate::source::{HttpSourceFetcher, SourceFetcher};
use crate::webhook::WebhookClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    info!("Configuration loaded successfully");
    info!("  Source channel: {}", config.source_channel_id);
    info!("  Loop guard: {:?}", config.dest_webhook_id);
    info!("  Allowed source webhook: {:?}", config.allowed_source_webhook_id);
    info!(
        "  Relay identity: {}",
        config.relay_username.as_deref().unwrap_or("(original author)")
    );
    info!("  Create on edit: {}", config.create_on_edit);

    // One shared HTTP client for the process lifetime; the timeout turns
    // hung deliveries into ordinary failures.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .context("Failed to build HTTP client")?;

    let webhook = Arc::new(WebhookClient::new(
        client.clone(),
        config.dest_webhook_url.clone(),
    ));
    let source = config
        .source_api_url
        .clone()
        .map(|base| Arc::new(HttpSourceFetcher::new(client, base)) as Arc<dyn SourceFetcher>);
    if source.is_none() {
        info!("No SOURCE_API_URL set; edits use the delivered payload as-is");
    }

    let port = config.port;
    let engine = Arc::new(RelayEngine::new(config, webhook, source));

    info!("Relay is starting...");
    server::run(engine, port).await
}
