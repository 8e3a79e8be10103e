//! Persistence layer for GasWatch
//!
//! Recipients and the alert log are accessed through the [`RecipientStore`]
//! and [`AlertRecordStore`] traits. PostgreSQL backs them in production, the
//! in-memory implementation backs `serve --in-memory` and the test suite.

pub mod memory;
mod postgres;

pub use memory::{MemoryAlertRecordStore, MemoryRecipientStore};
pub use postgres::{PgAlertRecordStore, PgRecipientStore, PostgresPool};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AlertRecord, ChatId, Recipient, Registration};

/// Keyed store of recipients.
///
/// Every mutating method is a single-record write, so concurrent
/// registrations and alert cycles never race across recipients.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Look a recipient up by normalized identity
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Recipient>>;

    /// Look a recipient up by attached chat
    async fn find_by_chat_id(&self, chat_id: ChatId) -> Result<Option<Recipient>>;

    /// Create the recipient, or replace its threshold and reactivate it
    async fn upsert_threshold(&self, identity: &str, threshold: i32) -> Result<Registration>;

    /// Attach `chat_id` to the recipient and activate it. Any other recipient
    /// holding the same chat loses it. Returns `None` for an unknown identity.
    async fn attach_chat(&self, identity: &str, chat_id: ChatId) -> Result<Option<Recipient>>;

    /// Disable alerts for the recipient attached to `chat_id`
    async fn deactivate_by_chat_id(&self, chat_id: ChatId) -> Result<Option<Recipient>>;

    /// Active recipients whose threshold is at or above `current_price`
    async fn list_eligible(&self, current_price: i32) -> Result<Vec<Recipient>>;

    /// Stamp a successful notification
    async fn record_notification(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Number of active recipients
    async fn count_active(&self) -> Result<u64>;
}

/// Append-only log of dispatch attempts
#[async_trait]
pub trait AlertRecordStore: Send + Sync {
    /// Append one attempt
    async fn append(&self, record: &AlertRecord) -> Result<()>;

    /// Attempts sent at or after `since`
    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Successful attempts sent at or after `since`
    async fn count_successful_since(&self, since: DateTime<Utc>) -> Result<u64>;
}
