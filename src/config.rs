use anyhow::{bail, Context, Result};

/// Process configuration, fixed at startup from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// The only channel messages are relayed from.
    pub source_channel_id: u64,
    /// Delivery endpoint of the destination webhook.
    pub dest_webhook_url: String,
    /// Id of the destination webhook, when known. Enables the self-loop guard.
    pub dest_webhook_id: Option<u64>,
    /// Webhook-originated messages are only relayed when they come from this
    /// webhook; unset means all webhook-originated messages are ignored.
    pub allowed_source_webhook_id: Option<u64>,
    /// Fixed relay display name. Unset means "forward the original author's
    /// name and avatar".
    pub relay_username: Option<String>,
    pub relay_avatar_url: Option<String>,
    /// On an edit with no recorded counterpart, relay it as a fresh create.
    pub create_on_edit: bool,
    /// Bind port for the liveness/dispatch server.
    pub port: u16,
    /// Base URL of the source collaborator's authoritative message endpoint
    /// (`GET {base}/{message_id}`), used to refresh stale edit payloads.
    pub source_api_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup function. Tests feed a map here
    /// instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source_channel_id = require(&lookup, "SOURCE_CHANNEL_ID")?
            .parse::<u64>()
            .context("SOURCE_CHANNEL_ID must be a numeric channel id")?;
        let dest_webhook_url = require(&lookup, "DEST_WEBHOOK_URL")?;

        let dest_webhook_id = parse_optional_u64(&lookup, "DEST_WEBHOOK_ID")?;
        let allowed_source_webhook_id =
            parse_optional_u64(&lookup, "ALLOWED_SOURCE_WEBHOOK_ID")?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            None => 10000,
        };

        let create_on_edit = match lookup("CREATE_ON_EDIT") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("CREATE_ON_EDIT has invalid value: {raw}"))?,
            None => true,
        };

        Ok(Config {
            source_channel_id,
            dest_webhook_url,
            dest_webhook_id,
            allowed_source_webhook_id,
            relay_username: lookup("RELAY_USERNAME").filter(|s| !s.is_empty()),
            relay_avatar_url: lookup("RELAY_AVATAR_URL").filter(|s| !s.is_empty()),
            create_on_edit,
            port,
            source_api_url: lookup("SOURCE_API_URL").filter(|s| !s.is_empty()),
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    match lookup(key).filter(|s| !s.is_empty()) {
        Some(value) => Ok(value),
        None => bail!("Missing required environment variable: {key}"),
    }
}

fn parse_optional_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>> {
    match lookup(key).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let value = raw
                .parse::<u64>()
                .with_context(|| format!("{key} must be a numeric id, got: {raw}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => bail!("expected a boolean"),
    }
}
