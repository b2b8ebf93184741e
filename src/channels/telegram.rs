//! Telegram channel: long-polls the Bot API for posts in one target chat.
//!
//! Both `channel_post` (broadcast channels) and `message` (groups) updates
//! are accepted as long as they come from the configured chat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channels::{Channel, IncomingMessage, MessageStream};
use crate::config::{lookup_value, parse_or, required};
use crate::error::{ChannelError, ConfigError};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Extra time the HTTP client waits beyond the long-poll timeout.
const POLL_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

// ── Configuration ───────────────────────────────────────────────────

/// Which chat to listen to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelTarget {
    /// Public username, stored lowercase without the leading `@`.
    Username(String),
    /// Numeric chat id (channels and supergroups are negative).
    ChatId(i64),
}

impl ChannelTarget {
    /// Parse `@name`, `name`, `https://t.me/name` or a numeric id.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(Self::ChatId(id));
        }

        let name = trimmed
            .trim_start_matches("https://")
            .trim_start_matches("t.me/")
            .trim_start_matches('@')
            .trim_end_matches('/');

        if name.is_empty() || name.contains('/') || name.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                key: "TELEGRAM_CHANNEL".into(),
                message: format!("{raw:?} is not a chat username or id"),
            });
        }

        Ok(Self::Username(name.to_lowercase()))
    }

    /// Does a Bot API `chat` object refer to this target?
    pub fn matches(&self, chat: &Value) -> bool {
        match self {
            Self::ChatId(id) => chat.get("id").and_then(Value::as_i64) == Some(*id),
            Self::Username(name) => chat
                .get("username")
                .and_then(Value::as_str)
                .is_some_and(|u| u.eq_ignore_ascii_case(name)),
        }
    }
}

impl std::fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username(name) => write!(f, "@{name}"),
            Self::ChatId(id) => write!(f, "{id}"),
        }
    }
}

/// Telegram channel configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub target: ChannelTarget,
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout: Duration,
    /// Pause after a failed poll before reconnecting.
    pub retry_delay: Duration,
}

impl TelegramConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let bot_token = required(
            lookup,
            "TELEGRAM_BOT_TOKEN",
            "Create a bot with @BotFather and add it to the channel as an administrator.",
        )?;
        let target = required(
            lookup,
            "TELEGRAM_CHANNEL",
            "Set it to the channel's @username or numeric chat id.",
        )?;

        // Zero turns long-polling into a busy loop against the Bot API.
        let poll_timeout_secs: u64 = parse_or(lookup, "TELEGRAM_POLL_TIMEOUT_SECS", 30)?;
        if poll_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TELEGRAM_POLL_TIMEOUT_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            target: ChannelTarget::parse(&target)?,
            api_base: lookup_value(lookup, "TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            retry_delay: Duration::from_secs(5),
        })
    }
}

// ── Update parsing ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Value>,
    description: Option<String>,
}

/// What to do with one raw update.
#[derive(Debug)]
pub enum UpdateOutcome {
    Accepted(IncomingMessage),
    /// Well-formed but not for us (other chat, edits, service updates).
    Ignored(&'static str),
    /// Could not extract text; dropped and logged.
    Malformed(String),
}

/// Convert a raw `getUpdates` item into a message for the target chat.
pub fn parse_update(update: &Value, target: &ChannelTarget) -> UpdateOutcome {
    if !update.is_object() {
        return UpdateOutcome::Malformed("update is not a JSON object".into());
    }

    let Some(post) = update
        .get("channel_post")
        .or_else(|| update.get("message"))
    else {
        return UpdateOutcome::Ignored("no new message in update");
    };

    let Some(chat) = post.get("chat") else {
        return UpdateOutcome::Malformed("message has no chat".into());
    };

    if !target.matches(chat) {
        return UpdateOutcome::Ignored("message from another chat");
    }

    let Some(text) = post
        .get("text")
        .or_else(|| post.get("caption"))
        .and_then(Value::as_str)
    else {
        return UpdateOutcome::Malformed("message has no text".into());
    };

    let chat_label = chat
        .get("username")
        .and_then(Value::as_str)
        .map(|u| format!("@{u}"))
        .or_else(|| chat.get("id").and_then(Value::as_i64).map(|id| id.to_string()))
        .unwrap_or_else(|| target.to_string());

    let received_at = post
        .get("date")
        .and_then(Value::as_i64)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    let incoming = IncomingMessage::new("telegram", chat_label, text)
        .with_received_at(received_at)
        .with_metadata(serde_json::json!({
            "update_id": update.get("update_id"),
            "message_id": post.get("message_id"),
            "chat_id": chat.get("id"),
        }));

    UpdateOutcome::Accepted(incoming)
}

// ── Channel ─────────────────────────────────────────────────────────

/// Telegram channel. Connects to the Bot API via long-polling.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    shutdown: Arc<AtomicBool>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(config.poll_timeout + POLL_TIMEOUT_SLACK)
            .build()
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            client,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn target(&self) -> &ChannelTarget {
        &self.config.target
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.config.api_base, &self.config.bot_token, method)
    }
}

fn api_url(base: &str, token: &SecretString, method: &str) -> String {
    format!(
        "{}/bot{}/{method}",
        base.trim_end_matches('/'),
        token.expose_secret()
    )
}

/// One `getUpdates` round-trip.
async fn fetch_updates(
    client: &reqwest::Client,
    url: &str,
    offset: i64,
    timeout: Duration,
) -> Result<Vec<Value>, ChannelError> {
    let body = serde_json::json!({
        "offset": offset,
        "timeout": timeout.as_secs(),
        "allowed_updates": ["channel_post", "message"],
    });

    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .map_err(|e| ChannelError::Http(e.without_url().to_string()))?;

    let data: UpdatesResponse = resp
        .json()
        .await
        .map_err(|e| ChannelError::InvalidMessage(e.without_url().to_string()))?;

    if !data.ok {
        return Err(ChannelError::Disconnected {
            name: "telegram".into(),
            reason: data
                .description
                .unwrap_or_else(|| "getUpdates returned ok=false".into()),
        });
    }

    Ok(data.result)
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = self.client.clone();
        let url = self.api_url("getUpdates");
        let target = self.config.target.clone();
        let poll_timeout = self.config.poll_timeout;
        let retry_delay = self.config.retry_delay;
        let shutdown = Arc::clone(&self.shutdown);
        shutdown.store(false, Ordering::Relaxed);

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            info!(target_chat = %target, "Telegram channel listening for messages");

            loop {
                if shutdown.load(Ordering::Relaxed) {
                    info!("Telegram poll loop shutting down");
                    return;
                }

                let updates = match fetch_updates(&client, &url, offset, poll_timeout).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!(error = %e, "Telegram poll error, reconnecting");
                        tokio::time::sleep(retry_delay).await;
                        continue;
                    }
                };

                for update in &updates {
                    // Advance past every update, including ones we drop.
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = offset.max(uid + 1);
                    }

                    match parse_update(update, &target) {
                        UpdateOutcome::Accepted(incoming) => {
                            debug!(
                                id = %incoming.id,
                                chat = %incoming.chat,
                                "Telegram message received"
                            );
                            if tx.send(incoming).is_err() {
                                info!("Telegram listener channel closed");
                                return;
                            }
                        }
                        UpdateOutcome::Ignored(reason) => {
                            debug!(reason, "Skipping Telegram update");
                        }
                        UpdateOutcome::Malformed(reason) => {
                            warn!(
                                reason = %reason,
                                update = %update,
                                "Dropping malformed Telegram update"
                            );
                        }
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        info!("Telegram channel shutting down");
        self.shutdown.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
