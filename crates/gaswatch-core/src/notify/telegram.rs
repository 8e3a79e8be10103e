//! Telegram Bot API transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::commands::CommandHandler;
use super::NotificationSink;
use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::models::ChatId;

/// Pause after a failed `getUpdates` before polling again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Sends messages through the Bot API `sendMessage` method
#[derive(Clone)]
pub struct TelegramSink {
    client: Client,
    base_url: String,
}

impl TelegramSink {
    /// Create a sink; each send is bounded by `config.send_timeout`
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.send_timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: bot_base_url(config),
        })
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let payload = SendMessagePayload { chat_id, text };

        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Dispatch(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response.json().await.map_err(|e| {
            Error::Dispatch(format!(
                "Telegram returned {status} with unreadable body: {}",
                e.without_url()
            ))
        })?;

        if !status.is_success() || !body.ok {
            return Err(Error::Dispatch(format!(
                "Telegram returned {}: {}",
                status,
                body.description.unwrap_or_default()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, chat_id: ChatId, text: &str) -> bool {
        match self.send_message(chat_id, text).await {
            Ok(()) => {
                debug!(chat_id, "Telegram message sent");
                true
            }
            Err(e) => {
                error!(chat_id, error = %e, "Failed to send Telegram message");
                false
            }
        }
    }
}

/// Long-polls `getUpdates` and hands text messages to a [`CommandHandler`]
pub struct TelegramPoller {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
    handler: Arc<CommandHandler>,
}

impl TelegramPoller {
    /// Create a poller
    pub fn new(config: &TelegramConfig, handler: Arc<CommandHandler>) -> Result<Self> {
        // The HTTP timeout must outlast the server-side long poll
        let client = Client::builder()
            .timeout(config.poll_timeout + Duration::from_secs(10))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: bot_base_url(config),
            poll_timeout: config.poll_timeout,
            handler,
        })
    }

    /// Poll forever. Errors are logged and polling resumes after a pause.
    pub async fn run(&self) {
        info!("Starting Telegram command poller");

        let mut offset: Option<i64> = None;
        loop {
            match self.poll_once(offset).await {
                Ok(next) => offset = next.or(offset),
                Err(e) => {
                    warn!(error = %e, "Telegram poll failed");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }

    /// Fetch one batch of updates and handle them. Returns the offset that
    /// acknowledges the batch, if it was non-empty.
    pub async fn poll_once(&self, offset: Option<i64>) -> Result<Option<i64>> {
        let request = GetUpdatesPayload {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };

        let response = self
            .client
            .post(format!("{}/getUpdates", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| Error::upstream(e.without_url().to_string()))?;

        if !status.is_success() || !body.ok {
            return Err(Error::upstream(format!(
                "getUpdates returned {}: {}",
                status,
                body.description.unwrap_or_default()
            )));
        }

        let updates = body.result.unwrap_or_default();
        let next_offset = updates.iter().map(|u| u.update_id + 1).max();

        for update in updates {
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let username = message.from.and_then(|u| u.username);

            // One bad update must not stall the rest of the batch
            if let Err(e) = self
                .handler
                .handle(message.chat.id, username.as_deref(), &text)
                .await
            {
                error!(chat_id = message.chat.id, error = %e, "Failed to handle bot command");
            }
        }

        Ok(next_offset)
    }
}

fn bot_base_url(config: &TelegramConfig) -> String {
    format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.bot_token)
}

// Bot API payload types

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: ChatId,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GetUpdatesPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<User>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: ChatId,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
}
