//! Trial and subscription gate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use docsmith_common::{EntitlementKind, EntitlementStatus};

use crate::models::UserSubscription;

/// What a user may do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    TrialAvailable,
    TrialUsed,
    Subscribed { until: Option<DateTime<Utc>> },
    Expired { ended_at: DateTime<Utc> },
}

impl Entitlement {
    /// Derive the entitlement from the user's `user_subscriptions` row.
    pub fn evaluate(record: Option<&UserSubscription>, now: DateTime<Utc>) -> Self {
        let Some(record) = record else {
            return Entitlement::TrialAvailable;
        };

        match (record.subscription_active(now), record.is_subscribed, record.free_trial_used) {
            (true, _, _) => Entitlement::Subscribed {
                until: record.subscription_end_date,
            },
            (false, _, false) => Entitlement::TrialAvailable,
            (false, true, true) => Entitlement::Expired {
                // an inactive subscribed row always has an end date
                ended_at: record.subscription_end_date.unwrap_or(now),
            },
            (false, false, true) => Entitlement::TrialUsed,
        }
    }

    pub fn can_generate(&self) -> bool {
        matches!(self, Entitlement::TrialAvailable | Entitlement::Subscribed { .. })
    }

    /// Whether a successful generation uses up the free trial.
    pub fn consumes_trial(&self) -> bool {
        matches!(self, Entitlement::TrialAvailable)
    }

    pub fn kind(&self) -> EntitlementKind {
        match self {
            Entitlement::TrialAvailable => EntitlementKind::TrialAvailable,
            Entitlement::TrialUsed => EntitlementKind::TrialUsed,
            Entitlement::Subscribed { .. } => EntitlementKind::Subscribed,
            Entitlement::Expired { .. } => EntitlementKind::Expired,
        }
    }

    pub fn status(&self, record: Option<&UserSubscription>) -> EntitlementStatus {
        EntitlementStatus {
            status: self.kind(),
            free_trial_used: record.map_or(false, |r| r.free_trial_used),
            is_subscribed: matches!(self, Entitlement::Subscribed { .. }),
            subscription_expires_at: match self {
                Entitlement::Subscribed { until } => *until,
                Entitlement::Expired { ended_at } => Some(*ended_at),
                _ => None,
            },
            can_generate: self.can_generate(),
        }
    }
}

/// Users with a trial generation in flight.
///
/// The trial flag is only written after the remote call returns, so without
/// this a second request could pass the gate in the meantime.
#[derive(Debug, Clone, Default)]
pub struct GenerationSlots {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl GenerationSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the user's slot, or `None` if it is already taken.
    pub fn claim(&self, user_id: &str) -> Option<SlotGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(user_id.to_string()) {
            return None;
        }
        Some(SlotGuard {
            in_flight: Arc::clone(&self.in_flight),
            user_id: user_id.to_string(),
        })
    }
}

/// Releases the slot on drop.
#[derive(Debug)]
pub struct SlotGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    user_id: String,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn record(free_trial_used: bool, is_subscribed: bool, end_offset_days: Option<i64>) -> UserSubscription {
        let mut row = UserSubscription::trial_used("user-1");
        row.free_trial_used = free_trial_used;
        row.is_subscribed = is_subscribed;
        row.subscription_end_date = end_offset_days.map(|d| Utc::now() + Duration::days(d));
        row
    }

    #[test]
    fn test_no_record_means_trial_available() {
        let entitlement = Entitlement::evaluate(None, Utc::now());
        assert_eq!(entitlement, Entitlement::TrialAvailable);
        assert!(entitlement.can_generate());
        assert!(entitlement.consumes_trial());
    }

    #[rstest]
    #[case(false, false, None, EntitlementKind::TrialAvailable, true)]
    #[case(true, false, None, EntitlementKind::TrialUsed, false)]
    #[case(true, true, Some(10), EntitlementKind::Subscribed, true)]
    #[case(false, true, Some(10), EntitlementKind::Subscribed, true)]
    #[case(true, true, None, EntitlementKind::Subscribed, true)]
    #[case(true, true, Some(-1), EntitlementKind::Expired, false)]
    #[case(false, true, Some(-1), EntitlementKind::TrialAvailable, true)]
    fn test_gate_cases(
        #[case] free_trial_used: bool,
        #[case] is_subscribed: bool,
        #[case] end_offset_days: Option<i64>,
        #[case] expected: EntitlementKind,
        #[case] can_generate: bool,
    ) {
        let row = record(free_trial_used, is_subscribed, end_offset_days);
        let entitlement = Entitlement::evaluate(Some(&row), Utc::now());
        assert_eq!(entitlement.kind(), expected);
        assert_eq!(entitlement.can_generate(), can_generate);
    }

    #[test]
    fn test_subscribers_do_not_consume_trial() {
        let row = record(false, true, Some(5));
        assert!(!Entitlement::evaluate(Some(&row), Utc::now()).consumes_trial());
    }

    #[test]
    fn test_status_reports_expiry() {
        let row = record(true, true, Some(-3));
        let status = Entitlement::evaluate(Some(&row), Utc::now()).status(Some(&row));
        assert_eq!(status.status, EntitlementKind::Expired);
        assert!(!status.is_subscribed);
        assert!(status.free_trial_used);
        assert_eq!(status.subscription_expires_at, row.subscription_end_date);
        assert!(!status.can_generate);
    }

    #[test]
    fn test_slot_is_exclusive_until_dropped() {
        let slots = GenerationSlots::new();
        let guard = slots.claim("user-1").unwrap();
        assert!(slots.claim("user-1").is_none());
        assert!(slots.claim("user-2").is_some());

        drop(guard);
        assert!(slots.claim("user-1").is_some());
    }
}
