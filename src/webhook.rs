use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Display identity stamped on an outgoing relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayIdentity {
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Terminal states of an edit call that are not transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Updated,
    /// The relayed message no longer exists at the destination.
    NotFound,
    /// The destination refused the edit; the message may still exist.
    Forbidden,
}

/// Destination-webhook collaborator. The engine only ever needs these two
/// calls; tests substitute a mock.
#[async_trait]
pub trait DestWebhook: Send + Sync {
    /// Post a new message and return its id at the destination.
    async fn create_message(&self, content: &str, identity: &DisplayIdentity) -> Result<u64>;

    /// Replace the content of a previously relayed message.
    async fn edit_message(&self, message_id: u64, content: &str) -> Result<EditStatus>;
}

/// Always-empty mention parse list, so relayed pings never fire.
#[derive(Serialize)]
struct AllowedMentions {
    parse: Vec<String>,
}

impl AllowedMentions {
    fn none() -> Self {
        Self { parse: Vec::new() }
    }
}

#[derive(Serialize)]
struct CreatePayload<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    content: &'a str,
    allowed_mentions: AllowedMentions,
}

#[derive(Serialize)]
struct EditPayload<'a> {
    content: &'a str,
    allowed_mentions: AllowedMentions,
}

#[derive(Deserialize)]
struct CreatedMessage {
    #[serde(deserialize_with = "id_from_string_or_number")]
    id: u64,
}

// Webhook APIs commonly serialize snowflake ids as strings; accept both.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// HTTP implementation of [`DestWebhook`] over a shared reqwest client.
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
}

impl WebhookClient {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl DestWebhook for WebhookClient {
    async fn create_message(&self, content: &str, identity: &DisplayIdentity) -> Result<u64> {
        let payload = CreatePayload {
            username: &identity.username,
            avatar_url: identity.avatar_url.as_deref(),
            content,
            allowed_mentions: AllowedMentions::none(),
        };

        // wait=true makes the destination return the created message body,
        // which carries the id the mapping needs.
        let url = format!("{}?wait=true", self.url);
        debug!("Posting relayed message to destination webhook");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send create-message request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webhook create failed ({}): {}", status, body);
        }

        let created: CreatedMessage = response
            .json()
            .await
            .context("Failed to parse create-message response")?;
        Ok(created.id)
    }

    async fn edit_message(&self, message_id: u64, content: &str) -> Result<EditStatus> {
        let payload = EditPayload {
            content,
            allowed_mentions: AllowedMentions::none(),
        };

        let url = format!("{}/messages/{}", self.url, message_id);
        debug!(message_id, "Editing relayed message at destination webhook");

        let response = self
            .client
            .patch(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send edit-message request")?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(EditStatus::NotFound),
            StatusCode::FORBIDDEN => Ok(EditStatus::Forbidden),
            status if status.is_success() => Ok(EditStatus::Updated),
            status => {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!("Webhook edit failed ({}): {}", status, body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_message_accepts_string_id() {
        let created: CreatedMessage =
            serde_json::from_str(r#"{"id": "123456789012345678"}"#).unwrap();
        assert_eq!(created.id, 123456789012345678);
    }

    #[test]
    fn test_created_message_accepts_numeric_id() {
        let created: CreatedMessage = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert_eq!(created.id, 42);
    }

    #[test]
    fn test_created_message_rejects_garbage_id() {
        let result: Result<CreatedMessage, _> = serde_json::from_str(r#"{"id": "abc"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_payload_omits_missing_avatar() {
        let payload = CreatePayload {
            username: "Bridge",
            avatar_url: None,
            content: "hello",
            allowed_mentions: AllowedMentions::none(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("avatar_url").is_none());
        assert_eq!(json["allowed_mentions"]["parse"], serde_json::json!([]));
    }
}
