//! Recipient data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Telegram chat id a recipient's alerts are delivered to
pub type ChatId = i64;

/// Lowest threshold a recipient may register, in Gwei
pub const MIN_THRESHOLD: i32 = 1;

/// Highest threshold a recipient may register, in Gwei
pub const MAX_THRESHOLD: i32 = 1000;

/// A subscriber waiting for the gas price to drop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Unique identifier
    pub id: Uuid,

    /// Normalized Telegram username, unique and immutable
    pub identity: String,

    /// Chat the bot delivers to; set by `/start`
    pub chat_id: Option<ChatId>,

    /// Maximum acceptable gas price in Gwei
    pub threshold: i32,

    /// Whether alerts are enabled
    pub is_active: bool,

    /// When the recipient registered
    pub created_at: DateTime<Utc>,

    /// Last successful notification
    pub last_notification_at: Option<DateTime<Utc>>,
}

impl Recipient {
    /// Create a new active recipient without a chat attached
    pub fn new(identity: impl Into<String>, threshold: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.into(),
            chat_id: None,
            threshold,
            is_active: true,
            created_at: Utc::now(),
            last_notification_at: None,
        }
    }

    /// Whether the current gas price is within what this recipient tolerates
    pub fn is_eligible(&self, current_price: i32) -> bool {
        self.is_active && self.threshold >= current_price
    }
}

/// Result of registering an identity/threshold pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new recipient was created
    Created(Recipient),
    /// An existing recipient had its threshold replaced and was reactivated
    Updated(Recipient),
}

impl Registration {
    /// The stored recipient
    pub fn recipient(&self) -> &Recipient {
        match self {
            Self::Created(r) | Self::Updated(r) => r,
        }
    }

    /// Whether the registration created a new record
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Status label reported to the caller
    pub fn status(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn threshold_equal_to_price_is_eligible() {
        let recipient = Recipient::new("alice_01", 30);

        assert!(recipient.is_eligible(30));
        assert!(recipient.is_eligible(29));
        assert!(!recipient.is_eligible(31));
    }

    #[test]
    fn inactive_recipient_is_never_eligible() {
        let mut recipient = Recipient::new("alice_01", 1000);
        recipient.is_active = false;

        assert!(!recipient.is_eligible(1));
    }

    proptest! {
        #[test]
        fn eligibility_matches_threshold_comparison(
            threshold in MIN_THRESHOLD..=MAX_THRESHOLD,
            price in 0i32..1500,
            active in any::<bool>(),
        ) {
            let mut recipient = Recipient::new("prop_user", threshold);
            recipient.is_active = active;

            prop_assert_eq!(recipient.is_eligible(price), active && threshold >= price);
        }
    }
}
