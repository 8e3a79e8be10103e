//! Recipient selection: threshold eligibility and notification cooldown

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::db::RecipientStore;
use crate::error::Result;
use crate::models::Recipient;

/// Default quiet period after a successful notification
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Selects recipients whose threshold tolerates the current price
#[derive(Clone)]
pub struct EligibilityFilter {
    store: Arc<dyn RecipientStore>,
}

impl EligibilityFilter {
    /// Create a filter over `store`
    pub fn new(store: Arc<dyn RecipientStore>) -> Self {
        Self { store }
    }

    /// Active recipients with `threshold >= current_price`
    pub async fn eligible(&self, current_price: i32) -> Result<Vec<Recipient>> {
        self.store.list_eligible(current_price).await
    }
}

/// Suppresses re-notification within a fixed window per recipient
#[derive(Debug, Clone, Copy)]
pub struct CooldownGate {
    cooldown: Duration,
}

impl CooldownGate {
    /// Create a gate with the given quiet period
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Whether `recipient` may be notified now
    pub fn should_notify(&self, recipient: &Recipient) -> bool {
        self.should_notify_at(recipient, Utc::now())
    }

    /// Whether `recipient` may be notified at `now`. The window is closed at
    /// its end: exactly `last + cooldown` is still suppressed.
    pub fn should_notify_at(&self, recipient: &Recipient, now: DateTime<Utc>) -> bool {
        let Some(last) = recipient.last_notification_at else {
            return true;
        };

        // A window too large to represent never ends
        chrono::Duration::from_std(self.cooldown)
            .ok()
            .and_then(|cooldown| last.checked_add_signed(cooldown))
            .is_some_and(|until| now > until)
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRecipientStore;
    use chrono::TimeZone;
    use rstest::rstest;

    fn notified_at(at: DateTime<Utc>) -> Recipient {
        let mut recipient = Recipient::new("alice_01", 30);
        recipient.last_notification_at = Some(at);
        recipient
    }

    #[test]
    fn never_notified_passes() {
        let gate = CooldownGate::default();
        assert!(gate.should_notify(&Recipient::new("alice_01", 30)));
    }

    #[rstest]
    #[case(59, false)]
    #[case(60, false)]
    #[case(61, true)]
    fn cooldown_boundary(#[case] minutes_later: i64, #[case] expected: bool) {
        let gate = CooldownGate::default();
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let recipient = notified_at(t);

        let now = t + chrono::Duration::minutes(minutes_later);

        assert_eq!(gate.should_notify_at(&recipient, now), expected);
    }

    #[test]
    fn one_second_past_the_window_passes() {
        let gate = CooldownGate::default();
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        let now = t + chrono::Duration::hours(1) + chrono::Duration::seconds(1);

        assert!(gate.should_notify_at(&notified_at(t), now));
    }

    #[tokio::test]
    async fn filter_applies_threshold_boundary() {
        let store = Arc::new(MemoryRecipientStore::new());
        store.upsert_threshold("at_price", 40).await.unwrap();
        store.upsert_threshold("below_pr", 39).await.unwrap();
        store.upsert_threshold("above_pr", 41).await.unwrap();
        let filter = EligibilityFilter::new(store);

        let mut names: Vec<_> = filter
            .eligible(40)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identity)
            .collect();
        names.sort();

        assert_eq!(names, vec!["above_pr", "at_price"]);
    }

    #[tokio::test]
    async fn filter_skips_inactive_recipients() {
        let store = Arc::new(MemoryRecipientStore::new());
        store.upsert_threshold("sleeper", 100).await.unwrap();
        store.attach_chat("sleeper", 1).await.unwrap();
        store.deactivate_by_chat_id(1).await.unwrap();
        let filter = EligibilityFilter::new(store);

        assert!(filter.eligible(10).await.unwrap().is_empty());
    }
}
