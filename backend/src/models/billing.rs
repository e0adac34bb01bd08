use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-user trial and subscription flags (`user_subscriptions` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub free_trial_used: bool,
    #[serde(default)]
    pub is_subscribed: bool,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub subscription_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSubscription {
    /// A fresh row for a user who has just consumed the trial.
    pub fn trial_used(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            free_trial_used: true,
            is_subscribed: false,
            payment_reference: None,
            subscription_start_date: None,
            subscription_end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Subscribed with a period that has not ended. A missing end date counts as open.
    pub fn subscription_active(&self, now: DateTime<Utc>) -> bool {
        self.is_subscribed && self.subscription_end_date.map_or(true, |end| end > now)
    }
}

/// Result of marking a user's trial as consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialUpdate {
    /// Users with an active subscription do not consume the trial.
    AlreadySubscribed,
    AlreadyUsed,
    /// Existing row updated.
    Marked,
    /// No row existed; one was created with the trial used.
    Created,
}

impl TrialUpdate {
    pub fn message(&self) -> &'static str {
        match self {
            TrialUpdate::AlreadySubscribed => "User is already subscribed",
            TrialUpdate::AlreadyUsed => "Free trial already used",
            TrialUpdate::Marked => "Free trial marked as used",
            TrialUpdate::Created => "User subscription created with free trial used",
        }
    }
}

/// Upsert payload flipping a user to subscribed.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribedUpdate {
    pub user_id: String,
    pub payment_reference: String,
    pub subscription_start_date: DateTime<Utc>,
    pub subscription_end_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscribedUpdate {
    pub fn from_subscription(subscription: &Subscription) -> Self {
        Self {
            user_id: subscription.user_id.clone(),
            payment_reference: subscription.payment_reference.clone(),
            subscription_start_date: subscription.created_at,
            subscription_end_date: subscription.expires_at,
            updated_at: Utc::now(),
        }
    }
}

/// A paid, time-boxed entitlement (`subscriptions` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub is_active: bool,
    pub payment_reference: String,
    /// Major currency units.
    pub amount: f64,
    pub expires_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(user_id: &str, payment_reference: &str, amount_cents: i64, days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            is_active: true,
            payment_reference: payment_reference.to_string(),
            amount: cents_to_amount(amount_cents),
            expires_at: now + Duration::days(days),
            status: "active".to_string(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// Audit row for every payment redirect that names a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub status: TransactionStatus,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub payment_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn new(user_id: &str, amount_cents: i64, status: TransactionStatus, payment_data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: cents_to_amount(amount_cents),
            status,
            payment_reference: None,
            subscription_id: None,
            payment_data,
            created_at: Utc::now(),
        }
    }
}

/// Gateway amounts arrive in cents; tables store major units.
pub fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}
