//! Notification delivery
//!
//! Alerts leave the system through a [`NotificationSink`]. Telegram is the
//! production sink; its inbound `/start`, `/status` and `/stop` commands are
//! handled by [`CommandHandler`].

mod commands;
mod telegram;

pub use commands::{BotCommand, CommandHandler};
pub use telegram::{TelegramPoller, TelegramSink};

use async_trait::async_trait;

use crate::models::ChatId;

/// Destination for outgoing messages
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text` to `chat_id`; `true` when the channel accepted it
    async fn send(&self, chat_id: ChatId, text: &str) -> bool;
}

/// Text of the alert sent when the gas price is within a recipient's limit
pub fn format_gas_alert(current_price: i32, threshold: i32) -> String {
    format!(
        "[GAS ALERT]\n\n\
         Current gas: {current_price} Gwei\n\
         Your limit: {threshold} Gwei\n\n\
         » Good time to make transactions!"
    )
}
