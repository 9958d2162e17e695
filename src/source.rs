use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::event::RelayEvent;

/// Source-channel collaborator used to re-fetch the authoritative form of a
/// message before propagating an edit. The delivered "after" payload can be
/// stale by the time the handler runs.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_message(&self, message_id: u64) -> Result<RelayEvent>;
}

/// HTTP implementation: `GET {base_url}/{message_id}` returning a normalized
/// message body.
pub struct HttpSourceFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSourceFetcher {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch_message(&self, message_id: u64) -> Result<RelayEvent> {
        let url = format!("{}/{}", self.base_url, message_id);
        debug!(message_id, "Fetching authoritative message from source");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send source fetch request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Source fetch failed ({})", status);
        }

        response
            .json::<RelayEvent>()
            .await
            .context("Failed to parse source message")
    }
}
