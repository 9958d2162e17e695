use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::event::RelayEvent;
use crate::relay::{EditOutcome, RelayEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Edit,
}

/// Normalized notification the chat-gateway collaborator POSTs to `/events`.
#[derive(Debug, Deserialize)]
pub struct GatewayNotification {
    pub kind: EventKind,
    #[serde(flatten)]
    pub event: RelayEvent,
}

#[derive(Serialize)]
struct DispatchResponse {
    status: &'static str,
}

pub fn router(engine: Arc<RelayEngine>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/events", post(dispatch))
        .with_state(engine)
}

/// Bind and serve until the process is stopped.
pub async fn run(engine: Arc<RelayEngine>, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("HTTP server running on 0.0.0.0:{port}");
    axum::serve(listener, router(engine))
        .await
        .context("HTTP server terminated")
}

async fn health() -> &'static str {
    "ok"
}

/// One inbound event at a time per connection; failures are logged and
/// acknowledged, the gateway has no retry channel.
async fn dispatch(
    State(engine): State<Arc<RelayEngine>>,
    Json(notification): Json<GatewayNotification>,
) -> Json<DispatchResponse> {
    let event = &notification.event;
    let status = match notification.kind {
        EventKind::Create => {
            if !engine.should_relay(event) {
                "skipped"
            } else {
                match engine.relay_send(event).await {
                    Ok(Some(_)) => "relayed",
                    Ok(None) => "skipped",
                    Err(e) => {
                        error!(message_id = event.id, error = %e, "Relay send failed");
                        "error"
                    }
                }
            }
        }
        EventKind::Edit => match engine.relay_edit(event).await {
            Ok(EditOutcome::Skipped) => "skipped",
            Ok(EditOutcome::CannotUpdate) => "cannot_update",
            Ok(EditOutcome::Created(_)) => "created",
            Ok(EditOutcome::Updated(_)) => "updated",
            Ok(EditOutcome::TargetMissing) => "target_missing",
            Ok(EditOutcome::Forbidden) => "forbidden",
            Err(e) => {
                error!(message_id = event.id, error = %e, "Relay edit failed");
                "error"
            }
        },
    };

    Json(DispatchResponse { status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    use crate::config::Config;
    use crate::event::Author;
    use crate::webhook::{DestWebhook, DisplayIdentity, EditStatus};

    struct StubWebhook;

    #[async_trait]
    impl DestWebhook for StubWebhook {
        async fn create_message(
            &self,
            _content: &str,
            _identity: &DisplayIdentity,
        ) -> Result<u64> {
            Ok(4242)
        }

        async fn edit_message(&self, _message_id: u64, _content: &str) -> Result<EditStatus> {
            Ok(EditStatus::Updated)
        }
    }

    fn test_engine() -> Arc<RelayEngine> {
        let config = Config {
            source_channel_id: 100,
            dest_webhook_url: "http://dest.example/webhook".to_string(),
            dest_webhook_id: None,
            allowed_source_webhook_id: None,
            relay_username: None,
            relay_avatar_url: None,
            create_on_edit: true,
            port: 10000,
            source_api_url: None,
        };
        Arc::new(RelayEngine::new(config, Arc::new(StubWebhook), None))
    }

    fn make_notification(kind: EventKind, channel_id: u64) -> GatewayNotification {
        GatewayNotification {
            kind,
            event: RelayEvent {
                id: 1,
                channel_id,
                webhook_id: None,
                author: Author {
                    display_name: "Alice".to_string(),
                    avatar_url: None,
                },
                content: "hello".to_string(),
                attachment_urls: Vec::new(),
                reply_to: None,
            },
        }
    }

    #[tokio::test]
    async fn test_dispatch_relays_create_on_source_channel() {
        let engine = test_engine();
        let response = dispatch(
            State(engine),
            Json(make_notification(EventKind::Create, 100)),
        )
        .await;
        assert_eq!(response.0.status, "relayed");
    }

    #[tokio::test]
    async fn test_dispatch_skips_create_from_other_channel() {
        let engine = test_engine();
        let response = dispatch(
            State(engine),
            Json(make_notification(EventKind::Create, 999)),
        )
        .await;
        assert_eq!(response.0.status, "skipped");
    }

    #[tokio::test]
    async fn test_dispatch_maps_edit_outcome() {
        let engine = test_engine();
        // First relay the create so the edit finds its counterpart.
        let response = dispatch(
            State(engine.clone()),
            Json(make_notification(EventKind::Create, 100)),
        )
        .await;
        assert_eq!(response.0.status, "relayed");

        let response = dispatch(
            State(engine),
            Json(make_notification(EventKind::Edit, 100)),
        )
        .await;
        assert_eq!(response.0.status, "updated");
    }

    #[test]
    fn test_notification_deserializes_create() {
        let notification: GatewayNotification = serde_json::from_str(
            r#"{
                "kind": "create",
                "id": 1,
                "channel_id": 100,
                "author": {"display_name": "Alice"},
                "content": "hello"
            }"#,
        )
        .unwrap();

        assert_eq!(notification.kind, EventKind::Create);
        assert_eq!(notification.event.id, 1);
    }

    #[test]
    fn test_notification_deserializes_edit() {
        let notification: GatewayNotification = serde_json::from_str(
            r#"{
                "kind": "edit",
                "id": 2,
                "channel_id": 100,
                "author": {"display_name": "Alice"},
                "content": "hello again"
            }"#,
        )
        .unwrap();

        assert_eq!(notification.kind, EventKind::Edit);
        assert_eq!(notification.event.content, "hello again");
    }

    #[test]
    fn test_notification_rejects_unknown_kind() {
        let result: Result<GatewayNotification, _> = serde_json::from_str(
            r#"{
                "kind": "delete",
                "id": 3,
                "channel_id": 100,
                "author": {"display_name": "Alice"}
            }"#,
        );
        assert!(result.is_err());
    }
}
