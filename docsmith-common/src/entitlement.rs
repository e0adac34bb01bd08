//! Entitlement view returned to the browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse entitlement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementKind {
    /// The one free generation has not been used.
    TrialAvailable,
    /// Trial consumed and no subscription.
    TrialUsed,
    /// Subscription in force.
    Subscribed,
    /// Subscribed once, but the period has ended.
    Expired,
}

/// What the creation page needs to lock or unlock the generate button.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementStatus {
    pub status: EntitlementKind,
    pub free_trial_used: bool,
    pub is_subscribed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub can_generate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EntitlementKind::TrialAvailable).unwrap();
        assert_eq!(json, r#""trial_available""#);
    }

    #[test]
    fn test_status_omits_missing_expiry() {
        let status = EntitlementStatus {
            status: EntitlementKind::TrialUsed,
            free_trial_used: true,
            is_subscribed: false,
            subscription_expires_at: None,
            can_generate: false,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("subscription_expires_at").is_none());
        assert_eq!(json["status"], "trial_used");
    }
}
