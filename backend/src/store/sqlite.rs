use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{BillingStore, Result, StoreError};
use crate::models::{
    DocumentUsage, PaymentTransaction, Subscription, SubscribedUpdate, TransactionStatus, TrialUpdate,
    UserSubscription,
};

const SCHEMA: [&str; 7] = [
    "CREATE TABLE IF NOT EXISTS user_subscriptions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL UNIQUE,
        free_trial_used INTEGER NOT NULL DEFAULT 0,
        is_subscribed INTEGER NOT NULL DEFAULT 0,
        payment_reference TEXT,
        subscription_start_date TEXT,
        subscription_end_date TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS subscriptions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        is_active INTEGER NOT NULL,
        payment_reference TEXT NOT NULL,
        amount REAL NOT NULL,
        expires_at TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS payment_transactions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        amount REAL NOT NULL,
        status TEXT NOT NULL,
        payment_reference TEXT,
        subscription_id TEXT,
        payment_data TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS document_usage (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        topic TEXT NOT NULL,
        num_pages INTEGER NOT NULL,
        filename TEXT NOT NULL,
        download_url TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_subscriptions_reference ON subscriptions(payment_reference)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_user_id ON payment_transactions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_document_usage_user_id ON document_usage(user_id, created_at)",
];

/// SQLite-backed billing tables.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        // Parse sqlite: prefix if present
        let path = path.strip_prefix("sqlite:").unwrap_or(path);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
            }
            Connection::open(path)
        }
        .map_err(db_error)?;

        for statement in SCHEMA {
            conn.execute(statement, []).map_err(db_error)?;
        }

        tracing::info!("SQLite store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StoreError::DatabaseError(e.to_string()))
    }
}

fn db_error(e: rusqlite::Error) -> StoreError {
    StoreError::DatabaseError(e.to_string())
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw, idx)
}

fn optional_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_timestamp(&raw, idx)).transpose()
}

fn parse_timestamp(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_subscription_row(row: &Row) -> rusqlite::Result<UserSubscription> {
    Ok(UserSubscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        free_trial_used: row.get(2)?,
        is_subscribed: row.get(3)?,
        payment_reference: row.get(4)?,
        subscription_start_date: optional_timestamp(row, 5)?,
        subscription_end_date: optional_timestamp(row, 6)?,
        created_at: timestamp(row, 7)?,
        updated_at: timestamp(row, 8)?,
    })
}

fn subscription_row(row: &Row) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        is_active: row.get(2)?,
        payment_reference: row.get(3)?,
        amount: row.get(4)?,
        expires_at: timestamp(row, 5)?,
        status: row.get(6)?,
        created_at: timestamp(row, 7)?,
    })
}

fn transaction_row(row: &Row) -> rusqlite::Result<PaymentTransaction> {
    let status: String = row.get(3)?;
    let status = TransactionStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("unknown status {}", status).into())
    })?;
    let payment_data: String = row.get(6)?;
    let payment_data = serde_json::from_str(&payment_data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(PaymentTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        status,
        payment_reference: row.get(4)?,
        subscription_id: row.get(5)?,
        payment_data,
        created_at: timestamp(row, 7)?,
    })
}

fn document_row(row: &Row) -> rusqlite::Result<DocumentUsage> {
    Ok(DocumentUsage {
        id: row.get(0)?,
        user_id: row.get(1)?,
        topic: row.get(2)?,
        num_pages: row.get(3)?,
        filename: row.get(4)?,
        download_url: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

const USER_SUBSCRIPTION_COLUMNS: &str = "id, user_id, free_trial_used, is_subscribed, payment_reference, \
     subscription_start_date, subscription_end_date, created_at, updated_at";

#[async_trait]
impl BillingStore for SqliteStore {
    fn driver(&self) -> &'static str {
        "sqlite"
    }

    async fn user_subscription(&self, user_id: &str) -> Result<Option<UserSubscription>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM user_subscriptions WHERE user_id = ?1", USER_SUBSCRIPTION_COLUMNS),
            params![user_id],
            user_subscription_row,
        )
        .optional()
        .map_err(db_error)
    }

    async fn mark_trial_used(&self, user_id: &str) -> Result<TrialUpdate> {
        let conn = self.lock()?;
        let now = Utc::now();

        let existing = conn
            .query_row(
                &format!("SELECT {} FROM user_subscriptions WHERE user_id = ?1", USER_SUBSCRIPTION_COLUMNS),
                params![user_id],
                user_subscription_row,
            )
            .optional()
            .map_err(db_error)?;

        match existing {
            Some(row) if row.subscription_active(now) => Ok(TrialUpdate::AlreadySubscribed),
            Some(row) if row.free_trial_used => Ok(TrialUpdate::AlreadyUsed),
            Some(row) => {
                conn.execute(
                    "UPDATE user_subscriptions SET free_trial_used = 1, updated_at = ?1 WHERE id = ?2",
                    params![now.to_rfc3339(), row.id],
                )
                .map_err(db_error)?;
                tracing::debug!("Marked free trial used for {}", user_id);
                Ok(TrialUpdate::Marked)
            }
            None => {
                let row = UserSubscription::trial_used(user_id);
                conn.execute(
                    "INSERT INTO user_subscriptions (id, user_id, free_trial_used, is_subscribed, created_at, updated_at)
                     VALUES (?1, ?2, 1, 0, ?3, ?4)",
                    params![row.id, row.user_id, row.created_at.to_rfc3339(), row.updated_at.to_rfc3339()],
                )
                .map_err(db_error)?;
                tracing::debug!("Created user subscription with free trial used for {}", user_id);
                Ok(TrialUpdate::Created)
            }
        }
    }

    async fn upsert_subscribed(&self, update: &SubscribedUpdate) -> Result<()> {
        let conn = self.lock()?;
        let updated_at = update.updated_at.to_rfc3339();

        conn.execute(
            "INSERT INTO user_subscriptions
                (id, user_id, free_trial_used, is_subscribed, payment_reference,
                 subscription_start_date, subscription_end_date, created_at, updated_at)
             VALUES (?1, ?2, 0, 1, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                is_subscribed = 1,
                payment_reference = excluded.payment_reference,
                subscription_start_date = excluded.subscription_start_date,
                subscription_end_date = excluded.subscription_end_date,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                update.user_id,
                update.payment_reference,
                update.subscription_start_date.to_rfc3339(),
                update.subscription_end_date.to_rfc3339(),
                updated_at,
            ],
        )
        .map_err(db_error)?;
        Ok(())
    }

    async fn subscription_by_reference(&self, payment_reference: &str) -> Result<Option<Subscription>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, user_id, is_active, payment_reference, amount, expires_at, status, created_at
             FROM subscriptions WHERE payment_reference = ?1 ORDER BY created_at LIMIT 1",
            params![payment_reference],
            subscription_row,
        )
        .optional()
        .map_err(db_error)
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO subscriptions (id, user_id, is_active, payment_reference, amount, expires_at, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                subscription.id,
                subscription.user_id,
                subscription.is_active,
                subscription.payment_reference,
                subscription.amount,
                subscription.expires_at.to_rfc3339(),
                subscription.status,
                subscription.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_error)?;
        Ok(())
    }

    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO payment_transactions
                (id, user_id, amount, status, payment_reference, subscription_id, payment_data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                transaction.id,
                transaction.user_id,
                transaction.amount,
                transaction.status.as_str(),
                transaction.payment_reference,
                transaction.subscription_id,
                transaction.payment_data.to_string(),
                transaction.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_error)?;
        Ok(())
    }

    async fn transactions_for_user(&self, user_id: &str) -> Result<Vec<PaymentTransaction>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, amount, status, payment_reference, subscription_id, payment_data, created_at
                 FROM payment_transactions WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![user_id], transaction_row)
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;
        Ok(rows)
    }

    async fn record_document(&self, document: &DocumentUsage) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO document_usage (id, user_id, topic, num_pages, filename, download_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.id,
                document.user_id,
                document.topic,
                document.num_pages,
                document.filename,
                document.download_url,
                document.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_error)?;
        Ok(())
    }

    async fn documents_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<DocumentUsage>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, topic, num_pages, filename, download_url, created_at
                 FROM document_usage WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![user_id, limit], document_row)
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;
        Ok(rows)
    }
}
