//! PostgreSQL connection and stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{AlertRecordStore, RecipientStore};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{AlertRecord, ChatId, Recipient, Registration};

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

const RECIPIENT_COLUMNS: &str =
    "id, identity, chat_id, threshold, is_active, created_at, last_notification_at";

/// Recipient store backed by the `recipients` table
#[derive(Clone)]
pub struct PgRecipientStore {
    pool: PgPool,
}

impl PgRecipientStore {
    /// Create a new recipient store
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }
}

#[async_trait]
impl RecipientStore for PgRecipientStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Recipient>> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE identity = $1"
        ))
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_chat_id(&self, chat_id: ChatId) -> Result<Option<Recipient>> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE chat_id = $1"
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert_threshold(&self, identity: &str, threshold: i32) -> Result<Registration> {
        // xmax is zero only for a freshly inserted tuple
        let row = sqlx::query_as::<_, UpsertRow>(&format!(
            r#"
            INSERT INTO recipients (id, identity, threshold, is_active, created_at)
            VALUES ($1, $2, $3, TRUE, $4)
            ON CONFLICT (identity) DO UPDATE SET
                threshold = EXCLUDED.threshold,
                is_active = TRUE
            RETURNING {RECIPIENT_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(identity)
        .bind(threshold)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        let inserted = row.inserted;
        let recipient = Recipient::from(row.recipient);
        Ok(if inserted {
            Registration::Created(recipient)
        } else {
            Registration::Updated(recipient)
        })
    }

    async fn attach_chat(&self, identity: &str, chat_id: ChatId) -> Result<Option<Recipient>> {
        let mut tx = self.pool.begin().await?;

        let target: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM recipients WHERE identity = $1 FOR UPDATE")
                .bind(identity)
                .fetch_optional(&mut *tx)
                .await?;

        // Unknown identity leaves every chat where it was
        if target.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("UPDATE recipients SET chat_id = NULL WHERE chat_id = $1 AND identity <> $2")
            .bind(chat_id)
            .bind(identity)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            r#"
            UPDATE recipients SET chat_id = $2, is_active = TRUE
            WHERE identity = $1
            RETURNING {RECIPIENT_COLUMNS}
            "#
        ))
        .bind(identity)
        .bind(chat_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(Into::into))
    }

    async fn deactivate_by_chat_id(&self, chat_id: ChatId) -> Result<Option<Recipient>> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "UPDATE recipients SET is_active = FALSE WHERE chat_id = $1 RETURNING {RECIPIENT_COLUMNS}"
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_eligible(&self, current_price: i32) -> Result<Vec<Recipient>> {
        let rows = sqlx::query_as::<_, RecipientRow>(&format!(
            r#"
            SELECT {RECIPIENT_COLUMNS} FROM recipients
            WHERE is_active = TRUE AND threshold >= $1
            "#
        ))
        .bind(current_price)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_notification(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE recipients SET last_notification_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count_active(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipients WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }
}

/// Alert log backed by the `alert_records` table
#[derive(Clone)]
pub struct PgAlertRecordStore {
    pool: PgPool,
}

impl PgAlertRecordStore {
    /// Create a new alert record store
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }
}

#[async_trait]
impl AlertRecordStore for PgAlertRecordStore {
    async fn append(&self, record: &AlertRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_records (id, recipient_id, gas_price, success, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.recipient_id)
        .bind(record.gas_price)
        .bind(record.success)
        .bind(record.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alert_records WHERE sent_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn count_successful_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alert_records WHERE success = TRUE AND sent_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }
}

// Database row types for mapping

#[derive(sqlx::FromRow)]
struct RecipientRow {
    id: Uuid,
    identity: String,
    chat_id: Option<i64>,
    threshold: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_notification_at: Option<DateTime<Utc>>,
}

impl From<RecipientRow> for Recipient {
    fn from(row: RecipientRow) -> Self {
        Recipient {
            id: row.id,
            identity: row.identity,
            chat_id: row.chat_id,
            threshold: row.threshold,
            is_active: row.is_active,
            created_at: row.created_at,
            last_notification_at: row.last_notification_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    recipient: RecipientRow,
    inserted: bool,
}
