use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::event::{Author, RelayEvent};
use crate::source::SourceFetcher;
use crate::webhook::{DestWebhook, DisplayIdentity, EditStatus};

/// Destination platform's maximum message length, in characters.
pub const MAX_CONTENT_LEN: usize = 2000;

/// In-memory source-id → relayed-id mapping. An entry exists only for
/// messages whose relay send was confirmed; it is purged when the relayed
/// counterpart turns out to be gone.
pub struct MappingStore {
    inner: Mutex<HashMap<u64, u64>>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, source_id: u64) -> Option<u64> {
        self.inner.lock().await.get(&source_id).copied()
    }

    pub async fn insert(&self, source_id: u64, relayed_id: u64) {
        self.inner.lock().await.insert(source_id, relayed_id);
    }

    pub async fn remove(&self, source_id: u64) {
        self.inner.lock().await.remove(&source_id);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// What happened to an edit notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Filtered out or nothing meaningful to relay.
    Skipped,
    /// No counterpart recorded and creating on edit is disabled.
    CannotUpdate,
    /// No counterpart recorded; relayed as a fresh message instead.
    Created(u64),
    Updated(u64),
    /// The counterpart no longer exists; its stale mapping was purged.
    TargetMissing,
    /// The destination refused the edit; the mapping is kept.
    Forbidden,
}

/// Relay decision and mapping engine. Owns the mapping store; collaborators
/// are injected so the decision logic is testable without a live connection.
pub struct RelayEngine {
    config: Config,
    webhook: Arc<dyn DestWebhook>,
    source: Option<Arc<dyn SourceFetcher>>,
    mapping: MappingStore,
}

impl RelayEngine {
    pub fn new(
        config: Config,
        webhook: Arc<dyn DestWebhook>,
        source: Option<Arc<dyn SourceFetcher>>,
    ) -> Self {
        Self {
            config,
            webhook,
            source,
            mapping: MappingStore::new(),
        }
    }

    /// Filtering rules, first match wins:
    /// wrong channel; webhook origin with no allow-list; webhook origin not
    /// on the allow-list; our own destination webhook (loop guard).
    pub fn should_relay(&self, event: &RelayEvent) -> bool {
        if event.channel_id != self.config.source_channel_id {
            return false;
        }
        if let Some(origin) = event.webhook_id {
            match self.config.allowed_source_webhook_id {
                None => return false,
                Some(allowed) if origin != allowed => return false,
                Some(_) => {}
            }
            if self.config.dest_webhook_id == Some(origin) {
                return false;
            }
        }
        true
    }

    /// Relay a newly created message. Returns the destination id on success,
    /// `None` when there was nothing meaningful to send (embed-only etc.).
    pub async fn relay_send(&self, event: &RelayEvent) -> Result<Option<u64>> {
        let content = build_relay_content(event);
        if content.is_empty() {
            debug!(message_id = event.id, "Nothing to relay, skipping");
            return Ok(None);
        }

        let identity = self.display_identity(&event.author);
        let relayed_id = self.webhook.create_message(&content, &identity).await?;
        self.mapping.insert(event.id, relayed_id).await;

        info!(source_id = event.id, relayed_id, "Message relayed");
        Ok(Some(relayed_id))
    }

    /// Propagate an edit to the relayed counterpart.
    pub async fn relay_edit(&self, event: &RelayEvent) -> Result<EditOutcome> {
        if !self.should_relay(event) {
            return Ok(EditOutcome::Skipped);
        }

        // The delivered "after" payload may be stale; prefer the source of
        // truth when a fetcher is configured, fall back on any failure.
        let event = match &self.source {
            Some(fetcher) => match fetcher.fetch_message(event.id).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(
                        message_id = event.id,
                        error = %e,
                        "Authoritative fetch failed, using delivered payload"
                    );
                    event.clone()
                }
            },
            None => event.clone(),
        };

        let content = build_relay_content(&event);
        if content.is_empty() {
            // Never delete a previously relayed message over an empty edit.
            debug!(message_id = event.id, "Edited message is empty, skipping");
            return Ok(EditOutcome::Skipped);
        }

        let relayed_id = match self.mapping.get(event.id).await {
            Some(id) => id,
            None => {
                if !self.config.create_on_edit {
                    info!(message_id = event.id, "No relayed counterpart, cannot update");
                    return Ok(EditOutcome::CannotUpdate);
                }
                return match self.relay_send(&event).await? {
                    Some(id) => Ok(EditOutcome::Created(id)),
                    None => Ok(EditOutcome::Skipped),
                };
            }
        };

        match self.webhook.edit_message(relayed_id, &content).await? {
            EditStatus::Updated => {
                info!(source_id = event.id, relayed_id, "Relayed message updated");
                Ok(EditOutcome::Updated(relayed_id))
            }
            EditStatus::NotFound => {
                info!(
                    source_id = event.id,
                    relayed_id, "Relayed message gone, purging stale mapping"
                );
                self.mapping.remove(event.id).await;
                Ok(EditOutcome::TargetMissing)
            }
            EditStatus::Forbidden => {
                warn!(relayed_id, "Destination refused the edit");
                Ok(EditOutcome::Forbidden)
            }
        }
    }

    fn display_identity(&self, author: &Author) -> DisplayIdentity {
        match &self.config.relay_username {
            Some(name) => DisplayIdentity {
                username: name.clone(),
                avatar_url: self.config.relay_avatar_url.clone(),
            },
            None => DisplayIdentity {
                username: author.display_name.clone(),
                avatar_url: author.avatar_url.clone(),
            },
        }
    }
}

/// Assemble the outgoing message body: optional reply quote, own text, then
/// attachment URLs one per line. Empty result means "do not send".
pub fn build_relay_content(event: &RelayEvent) -> String {
    let mut content = String::new();

    if let Some(reply) = &event.reply_to {
        let quoted = reply.text.trim();
        if !quoted.is_empty() {
            content.push_str(&format!("> Replying to {}: {}\n", reply.author, quoted));
        }
    }

    content.push_str(&event.content);

    if !event.attachment_urls.is_empty() {
        if !content.is_empty() {
            content.push_str("\n\n");
        }
        content.push_str(&event.attachment_urls.join("\n"));
    }

    truncate_chars(content.trim(), MAX_CONTENT_LEN).to_string()
}

// The limit is in characters, not bytes; multibyte text must not be
// over-truncated.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
