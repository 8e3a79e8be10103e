//! In-memory stores
//!
//! Same contract as the PostgreSQL stores, including the uniqueness of
//! identities and chat ids. Data lives for the life of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{AlertRecordStore, RecipientStore};
use crate::error::{Error, Result};
use crate::models::{AlertRecord, ChatId, Recipient, Registration};

/// Recipients held in a map keyed by id
#[derive(Default)]
pub struct MemoryRecipientStore {
    recipients: RwLock<HashMap<Uuid, Recipient>>,
}

impl MemoryRecipientStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a recipient as-is
    pub fn insert(&self, recipient: Recipient) -> Result<()> {
        let mut recipients = self.recipients.write();

        let clash = recipients.values().any(|r| {
            r.id != recipient.id
                && (r.identity == recipient.identity
                    || (r.chat_id.is_some() && r.chat_id == recipient.chat_id))
        });
        if clash {
            return Err(Error::store(format!(
                "recipient {} conflicts with an existing identity or chat",
                recipient.identity
            )));
        }

        recipients.insert(recipient.id, recipient);
        Ok(())
    }

    /// Copy of every stored recipient
    pub fn snapshot(&self) -> Vec<Recipient> {
        self.recipients.read().values().cloned().collect()
    }
}

#[async_trait]
impl RecipientStore for MemoryRecipientStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Recipient>> {
        Ok(self.recipients.read().values().find(|r| r.identity == identity).cloned())
    }

    async fn find_by_chat_id(&self, chat_id: ChatId) -> Result<Option<Recipient>> {
        Ok(self
            .recipients
            .read()
            .values()
            .find(|r| r.chat_id == Some(chat_id))
            .cloned())
    }

    async fn upsert_threshold(&self, identity: &str, threshold: i32) -> Result<Registration> {
        let mut recipients = self.recipients.write();

        if let Some(existing) = recipients.values_mut().find(|r| r.identity == identity) {
            existing.threshold = threshold;
            existing.is_active = true;
            return Ok(Registration::Updated(existing.clone()));
        }

        let recipient = Recipient::new(identity, threshold);
        recipients.insert(recipient.id, recipient.clone());
        Ok(Registration::Created(recipient))
    }

    async fn attach_chat(&self, identity: &str, chat_id: ChatId) -> Result<Option<Recipient>> {
        let mut recipients = self.recipients.write();

        if !recipients.values().any(|r| r.identity == identity) {
            return Ok(None);
        }

        let mut attached = None;
        for recipient in recipients.values_mut() {
            if recipient.identity == identity {
                recipient.chat_id = Some(chat_id);
                recipient.is_active = true;
                attached = Some(recipient.clone());
            } else if recipient.chat_id == Some(chat_id) {
                recipient.chat_id = None;
            }
        }

        Ok(attached)
    }

    async fn deactivate_by_chat_id(&self, chat_id: ChatId) -> Result<Option<Recipient>> {
        let mut recipients = self.recipients.write();

        Ok(recipients
            .values_mut()
            .find(|r| r.chat_id == Some(chat_id))
            .map(|r| {
                r.is_active = false;
                r.clone()
            }))
    }

    async fn list_eligible(&self, current_price: i32) -> Result<Vec<Recipient>> {
        Ok(self
            .recipients
            .read()
            .values()
            .filter(|r| r.is_eligible(current_price))
            .cloned()
            .collect())
    }

    async fn record_notification(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut recipients = self.recipients.write();
        let recipient = recipients
            .get_mut(&id)
            .ok_or_else(|| Error::store(format!("recipient {id} not found")))?;
        recipient.last_notification_at = Some(at);
        Ok(())
    }

    async fn count_active(&self) -> Result<u64> {
        let count = self.recipients.read().values().filter(|r| r.is_active).count();
        Ok(count as u64)
    }
}

/// Alert log held in a vector
#[derive(Default)]
pub struct MemoryAlertRecordStore {
    records: RwLock<Vec<AlertRecord>>,
}

impl MemoryAlertRecordStore {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record in insertion order
    pub fn snapshot(&self) -> Vec<AlertRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl AlertRecordStore for MemoryAlertRecordStore {
    async fn append(&self, record: &AlertRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let count = self.records.read().iter().filter(|r| r.sent_at >= since).count();
        Ok(count as u64)
    }

    async fn count_successful_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let count = self
            .records
            .read()
            .iter()
            .filter(|r| r.success && r.sent_at >= since)
            .count();
        Ok(count as u64)
    }
}
