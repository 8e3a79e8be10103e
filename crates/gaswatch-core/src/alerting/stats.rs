//! Rolling counters over the alert log

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::{AlertRecordStore, RecipientStore};
use crate::error::Result;
use crate::models::AlertStats;

/// Computes [`AlertStats`] fresh on every call
#[derive(Clone)]
pub struct StatsAggregator {
    recipients: Arc<dyn RecipientStore>,
    records: Arc<dyn AlertRecordStore>,
}

impl StatsAggregator {
    /// Create an aggregator
    pub fn new(recipients: Arc<dyn RecipientStore>, records: Arc<dyn AlertRecordStore>) -> Self {
        Self {
            recipients,
            records,
        }
    }

    /// Counters for the 24 hours before now
    pub async fn current_stats(&self) -> Result<AlertStats> {
        self.stats_at(Utc::now()).await
    }

    /// Counters for the 24 hours before `now`
    pub async fn stats_at(&self, now: DateTime<Utc>) -> Result<AlertStats> {
        let since = now - Duration::hours(24);

        Ok(AlertStats {
            total_alerts_24h: self.records.count_since(since).await?,
            successful_alerts_24h: self.records.count_successful_since(since).await?,
            active_users: self.recipients.count_active().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryAlertRecordStore, MemoryRecipientStore};
    use crate::models::AlertRecord;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[tokio::test]
    async fn counts_only_the_trailing_day() {
        let recipients = Arc::new(MemoryRecipientStore::new());
        let records = Arc::new(MemoryAlertRecordStore::new());
        recipients.upsert_threshold("alice_01", 30).await.unwrap();
        recipients.upsert_threshold("bob_chain", 30).await.unwrap();

        let now = Utc::now();
        let id = Uuid::new_v4();
        for (age_hours, success) in [(1, true), (2, false), (23, true), (25, true)] {
            records
                .append(&AlertRecord::new(id, 20, success, now - Duration::hours(age_hours)))
                .await
                .unwrap();
        }

        let stats = StatsAggregator::new(recipients, records).stats_at(now).await.unwrap();

        assert_eq!(
            stats,
            AlertStats {
                total_alerts_24h: 3,
                successful_alerts_24h: 2,
                active_users: 2,
            }
        );
    }

    #[tokio::test]
    async fn empty_stores_report_zero() {
        let stats = StatsAggregator::new(
            Arc::new(MemoryRecipientStore::new()),
            Arc::new(MemoryAlertRecordStore::new()),
        )
        .current_stats()
        .await
        .unwrap();

        assert_eq!(stats, AlertStats::default());
    }
}
