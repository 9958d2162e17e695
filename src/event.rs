use serde::Deserialize;

/// Author identity on an inbound message, with an explicit optional avatar.
#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Context of the message this one replies to, if any.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRef {
    pub author: String,
    #[serde(default)]
    pub text: String,
}

/// A normalized message notification from the chat gateway.
///
/// Carries the full message body for both creates and edits; for edits this
/// is the "after" payload, which may lag behind the source of truth.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayEvent {
    pub id: u64,
    pub channel_id: u64,
    /// Set when the message was posted through a webhook rather than a user
    /// session. Used by the loop guard.
    #[serde(default)]
    pub webhook_id: Option<u64>,
    pub author: Author,
    #[serde(default)]
    pub content: String,
    /// Attachment URLs in the order the platform lists them.
    #[serde(default)]
    pub attachment_urls: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<ReplyRef>,
}
