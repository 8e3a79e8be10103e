//! Alert delivery and bookkeeping

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::{AlertRecordStore, RecipientStore};
use crate::error::Result;
use crate::models::{AlertRecord, Recipient};
use crate::notify::{format_gas_alert, NotificationSink};

/// What happened to one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No chat attached; nothing was sent or recorded
    Skipped,
    /// The sink accepted the alert
    Delivered,
    /// The sink rejected the alert; the attempt was recorded
    Failed,
}

impl DispatchOutcome {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

/// Sends gas alerts and writes every attempt to the alert log
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    recipients: Arc<dyn RecipientStore>,
    records: Arc<dyn AlertRecordStore>,
}

impl NotificationDispatcher {
    /// Create a dispatcher
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        recipients: Arc<dyn RecipientStore>,
        records: Arc<dyn AlertRecordStore>,
    ) -> Self {
        Self {
            sink,
            recipients,
            records,
        }
    }

    /// Alert `recipient` that the gas price is `current_price`
    pub async fn dispatch(&self, recipient: &Recipient, current_price: i32) -> Result<DispatchOutcome> {
        self.dispatch_at(recipient, current_price, Utc::now()).await
    }

    /// [`dispatch`](Self::dispatch) stamped with an explicit time
    pub async fn dispatch_at(
        &self,
        recipient: &Recipient,
        current_price: i32,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome> {
        let Some(chat_id) = recipient.chat_id else {
            info!(recipient = %recipient.identity, "No chat attached, skipping alert");
            metrics::counter!("gaswatch_alerts_total", "outcome" => "skipped").increment(1);
            return Ok(DispatchOutcome::Skipped);
        };

        let text = format_gas_alert(current_price, recipient.threshold);
        let success = self.sink.send(chat_id, &text).await;

        self.records
            .append(&AlertRecord::new(recipient.id, current_price, success, now))
            .await?;

        let outcome = if success {
            self.recipients.record_notification(recipient.id, now).await?;
            info!(
                recipient = %recipient.identity,
                price = current_price,
                threshold = recipient.threshold,
                "Gas alert delivered"
            );
            DispatchOutcome::Delivered
        } else {
            warn!(
                recipient = %recipient.identity,
                price = current_price,
                "Gas alert was not delivered"
            );
            DispatchOutcome::Failed
        };

        metrics::counter!("gaswatch_alerts_total", "outcome" => outcome.as_str()).increment(1);
        Ok(outcome)
    }
}
