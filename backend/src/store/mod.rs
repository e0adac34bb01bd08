//! Persistence for trial, subscription and payment state.
//!
//! The hosted database is authoritative in production ([`RestStore`]).
//! [`SqliteStore`] keeps the same tables locally for development and tests.

mod rest;
mod sqlite;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::models::{DocumentUsage, PaymentTransaction, Subscription, SubscribedUpdate, TrialUpdate, UserSubscription};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Request to database failed: {0}")]
    RequestFailed(String),
    #[error("Database rejected request: {0}")]
    Rejected(String),
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage for the billing tables.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Driver name for logs.
    fn driver(&self) -> &'static str;

    async fn user_subscription(&self, user_id: &str) -> Result<Option<UserSubscription>>;

    /// Mark the free trial as consumed, creating the row if needed.
    async fn mark_trial_used(&self, user_id: &str) -> Result<TrialUpdate>;

    /// Flip a user to subscribed. `free_trial_used` is left untouched.
    async fn upsert_subscribed(&self, update: &SubscribedUpdate) -> Result<()>;

    async fn subscription_by_reference(&self, payment_reference: &str) -> Result<Option<Subscription>>;

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<()>;

    async fn insert_transaction(&self, transaction: &PaymentTransaction) -> Result<()>;

    /// Newest first.
    async fn transactions_for_user(&self, user_id: &str) -> Result<Vec<PaymentTransaction>>;

    async fn record_document(&self, document: &DocumentUsage) -> Result<()>;

    /// Newest first, at most `limit` rows.
    async fn documents_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<DocumentUsage>>;
}
