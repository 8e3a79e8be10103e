//! Recipient registration

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::RecipientStore;
use crate::error::Result;
use crate::models::Registration;
use crate::validation::{normalize_identity, validate_threshold};

/// Registration request as submitted by the landing page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// Telegram username, with or without the leading `@`
    #[serde(default)]
    pub telegram_username: Option<String>,

    /// Maximum acceptable gas price in Gwei
    #[serde(default)]
    pub max_gas_price: Option<i64>,
}

/// Registration result returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    /// Normalized identity as stored
    pub telegram_username: String,
    /// Stored threshold in Gwei
    pub max_gas_price: i32,
    /// `"created"` or `"updated"`
    pub status: String,
    /// Next step for the user
    pub message: String,
}

/// Validates registrations and writes them to the recipient store
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn RecipientStore>,
    bot_username: String,
}

impl RegistrationService {
    /// Create a service; `bot_username` is quoted in the confirmation message
    pub fn new(store: Arc<dyn RecipientStore>, bot_username: impl Into<String>) -> Self {
        Self {
            store,
            bot_username: bot_username.into(),
        }
    }

    /// Create the recipient or update its threshold and reactivate it
    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegistrationResponse> {
        let identity = normalize_identity(request.telegram_username.as_deref().unwrap_or_default())?;
        let threshold = validate_threshold(request.max_gas_price.unwrap_or_default())?;

        let registration = self.store.upsert_threshold(&identity, threshold).await?;

        info!(
            recipient = %identity,
            threshold,
            status = registration.status(),
            "Registration stored"
        );

        Ok(RegistrationResponse {
            telegram_username: identity,
            max_gas_price: threshold,
            status: registration.status().to_string(),
            message: self.message_for(&registration),
        })
    }

    fn message_for(&self, registration: &Registration) -> String {
        match registration {
            Registration::Created(_) => format!(
                "Alert created! Send /start to the Telegram bot (@{}) to activate it.",
                self.bot_username
            ),
            Registration::Updated(_) => {
                "Alert updated! Send /start to the Telegram bot to activate it.".to_string()
            }
        }
    }
}
