//! Alert data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One dispatch attempt, successful or not. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Recipient the alert was addressed to
    pub recipient_id: Uuid,

    /// Gas price in Gwei at send time
    pub gas_price: i32,

    /// Whether the notification sink accepted the message
    pub success: bool,

    /// When the attempt was made
    pub sent_at: DateTime<Utc>,
}

impl AlertRecord {
    /// Record an attempt made at `sent_at`
    pub fn new(recipient_id: Uuid, gas_price: i32, success: bool, sent_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            gas_price,
            success,
            sent_at,
        }
    }
}

/// Rolling counters derived from the alert log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    /// Alert attempts in the trailing 24 hours
    pub total_alerts_24h: u64,

    /// Successful alerts in the trailing 24 hours
    pub successful_alerts_24h: u64,

    /// Recipients with alerts enabled
    pub active_users: u64,
}
