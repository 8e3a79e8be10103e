//! Bot commands: `/start`, `/status`, `/stop`

use std::sync::Arc;

use tracing::{info, warn};

use super::NotificationSink;
use crate::db::RecipientStore;
use crate::error::Result;
use crate::models::{ChatId, Recipient};

/// Commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Attach this chat to the sender's registration and enable alerts
    Start,
    /// Show the registration attached to this chat
    Status,
    /// Disable alerts for this chat
    Stop,
}

impl BotCommand {
    /// Parse message text. Accepts `/cmd`, `/cmd@BotName` and trailing
    /// arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.split('@').next()?;
        match name {
            "/start" => Some(Self::Start),
            "/status" => Some(Self::Status),
            "/stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Applies bot commands to the recipient store and replies through the sink
pub struct CommandHandler {
    store: Arc<dyn RecipientStore>,
    sink: Arc<dyn NotificationSink>,
}

impl CommandHandler {
    /// Create a handler
    pub fn new(store: Arc<dyn RecipientStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }

    /// Handle one incoming message and send the reply
    pub async fn handle(&self, chat_id: ChatId, username: Option<&str>, text: &str) -> Result<()> {
        let reply = self.reply_for(chat_id, username, text).await?;

        if !self.sink.send(chat_id, &reply).await {
            warn!(chat_id, "Bot reply was not delivered");
        }
        Ok(())
    }

    /// Apply the command and build the reply without sending it
    pub async fn reply_for(
        &self,
        chat_id: ChatId,
        username: Option<&str>,
        text: &str,
    ) -> Result<String> {
        match BotCommand::parse(text) {
            Some(BotCommand::Start) => self.start(chat_id, username).await,
            Some(BotCommand::Status) => self.status(chat_id).await,
            Some(BotCommand::Stop) => self.stop(chat_id).await,
            None => Ok("Unknown command. Use /start to begin.".to_string()),
        }
    }

    async fn start(&self, chat_id: ChatId, username: Option<&str>) -> Result<String> {
        let Some(username) = username.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(
                "[ERROR] You need to configure a Telegram username to use this bot.".to_string(),
            );
        };

        let identity = username.to_lowercase();

        match self.store.attach_chat(&identity, chat_id).await? {
            Some(recipient) => {
                info!(recipient = %recipient.identity, chat_id, "Chat attached");
                Ok(format!(
                    "[ACTIVE] Welcome back, @{username}!\n\n\
                     Your alert is active for gas price ≤ {} Gwei.\n\n\
                     Available commands:\n\
                     /status - View current settings\n\
                     /stop - Disable alerts",
                    recipient.threshold
                ))
            }
            None => Ok(format!(
                "[INFO] Hello, @{identity}!\n\n\
                 To create an alert, visit our landing page and configure your gas price threshold.\n\n\
                 After setup, use /start again to activate notifications."
            )),
        }
    }

    async fn status(&self, chat_id: ChatId) -> Result<String> {
        let Some(recipient) = self.store.find_by_chat_id(chat_id).await? else {
            return Ok(
                "[ERROR] You are not registered yet. Configure your alert on the landing page."
                    .to_string(),
            );
        };

        Ok(format_status(&recipient))
    }

    async fn stop(&self, chat_id: ChatId) -> Result<String> {
        match self.store.deactivate_by_chat_id(chat_id).await? {
            Some(recipient) => {
                info!(recipient = %recipient.identity, chat_id, "Alerts disabled");
                Ok("[SUCCESS] Alerts disabled. Use /start to reactivate.".to_string())
            }
            None => Ok("[ERROR] You are not registered.".to_string()),
        }
    }
}

fn format_status(recipient: &Recipient) -> String {
    let status = if recipient.is_active {
        "[ACTIVE]"
    } else {
        "[INACTIVE]"
    };
    let last = recipient
        .last_notification_at
        .map_or_else(|| "Never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    format!(
        "ALERT STATUS\n\n\
         Username: @{}\n\
         Max Gas Price: {} Gwei\n\
         Status: {}\n\
         Last notification: {}",
        recipient.identity, recipient.threshold, status, last
    )
}
