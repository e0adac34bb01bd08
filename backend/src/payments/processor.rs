use std::sync::Arc;

use docsmith_common::PaymentOutcome;
use serde::Deserialize;
use serde_json::json;

use super::signature::SignatureVerifier;
use crate::models::{PaymentTransaction, SubscribedUpdate, Subscription, TransactionStatus};
use crate::store::{BillingStore, StoreError};

/// Query parameters of a gateway redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub id: Option<String>,
    pub success: Option<String>,
    pub amount_cents: Option<String>,
    pub txn_response_code: Option<String>,
    pub user_id: Option<String>,
    /// Gateway signature over its own fields.
    pub hmac: Option<String>,
    /// Our signature over `user_id`.
    pub state: Option<String>,
}

impl CallbackParams {
    fn field(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or("")
    }

    /// Plain decimal digits only. The gateway signature has no field
    /// separators, so any other form could be a shifted `id`.
    fn amount_cents(&self) -> Option<i64> {
        self.amount_cents
            .as_deref()
            .filter(|a| !a.is_empty() && a.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|a| a.parse().ok())
    }

    fn approved(&self) -> bool {
        self.success.as_deref() == Some("true") && self.txn_response_code.as_deref() == Some("APPROVED")
    }
}

/// Which endpoint the gateway sent the browser to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackSource {
    Callback,
    Fallback,
}

impl CallbackSource {
    fn name(&self) -> &'static str {
        match self {
            CallbackSource::Callback => "callback",
            CallbackSource::Fallback => "fallback",
        }
    }
}

/// Turns a gateway redirect into subscription state.
pub struct PaymentProcessor {
    store: Arc<dyn BillingStore>,
    signatures: SignatureVerifier,
    /// Price every callback must report.
    expected_amount_cents: i64,
    subscription_days: i64,
}

impl PaymentProcessor {
    pub fn new(
        store: Arc<dyn BillingStore>,
        signatures: SignatureVerifier,
        expected_amount_cents: i64,
        subscription_days: i64,
    ) -> Self {
        Self {
            store,
            signatures,
            expected_amount_cents,
            subscription_days,
        }
    }

    pub fn signatures(&self) -> &SignatureVerifier {
        &self.signatures
    }

    pub async fn process(&self, params: &CallbackParams, source: CallbackSource) -> PaymentOutcome {
        tracing::info!(
            source = source.name(),
            payment_id = ?params.id,
            user_id = ?params.user_id,
            success = ?params.success,
            txn_response_code = ?params.txn_response_code,
            "Payment redirect received"
        );

        match self.try_process(params, source).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Error processing payment {}: {}", source.name(), e);
                PaymentOutcome::error("server_error")
            }
        }
    }

    async fn try_process(&self, params: &CallbackParams, source: CallbackSource) -> Result<PaymentOutcome, StoreError> {
        let Some(user_id) = params.user_id.as_deref().filter(|u| !u.is_empty()) else {
            tracing::warn!("Payment {} missing user ID", source.name());
            return Ok(PaymentOutcome::error("missing_user_id"));
        };
        let Some(payment_id) = params.id.as_deref().filter(|p| !p.is_empty()) else {
            tracing::warn!("Payment {} missing payment ID", source.name());
            return Ok(PaymentOutcome::error("missing_payment_id"));
        };

        if !self.signatures.verify_state(user_id, CallbackParams::field(&params.state)) {
            tracing::warn!("Payment {} has an invalid state token for {}", source.name(), user_id);
            return Ok(PaymentOutcome::error("invalid_state"));
        }
        if !self.signatures.verify_gateway(
            CallbackParams::field(&params.amount_cents),
            payment_id,
            CallbackParams::field(&params.success),
            CallbackParams::field(&params.txn_response_code),
            CallbackParams::field(&params.hmac),
        ) {
            tracing::warn!("Payment {} has an invalid gateway signature", source.name());
            return Ok(PaymentOutcome::error("invalid_signature"));
        }

        let amount_cents = match params.amount_cents() {
            Some(cents) if cents == self.expected_amount_cents => cents,
            other => {
                tracing::warn!(
                    "Payment {} reports amount {:?}, expected {}",
                    payment_id,
                    other,
                    self.expected_amount_cents
                );
                return Ok(PaymentOutcome::error("invalid_amount"));
            }
        };
        let payment_data = self.payment_data(params, source);

        if !params.approved() {
            let mut transaction =
                PaymentTransaction::new(user_id, amount_cents, TransactionStatus::Failed, payment_data);
            transaction.payment_reference = Some(payment_id.to_string());
            if let Err(e) = self.store.insert_transaction(&transaction).await {
                tracing::error!("Error logging failed payment: {}", e);
            }

            let reason = params
                .txn_response_code
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "unknown".to_string());
            tracing::info!("Payment {} was unsuccessful: {}", payment_id, reason);
            return Ok(PaymentOutcome::Failed { reason });
        }

        let subscription = match self.store.subscription_by_reference(payment_id).await? {
            Some(existing) => {
                tracing::info!("Payment {} already recorded as subscription {}", payment_id, existing.id);
                existing
            }
            None => {
                let subscription = Subscription::new(user_id, payment_id, amount_cents, self.subscription_days);
                if let Err(e) = self.store.insert_subscription(&subscription).await {
                    tracing::error!("Error creating subscription: {}", e);
                    return Ok(PaymentOutcome::error("subscription_creation_failed"));
                }

                let mut transaction =
                    PaymentTransaction::new(user_id, amount_cents, TransactionStatus::Completed, payment_data);
                transaction.payment_reference = Some(payment_id.to_string());
                transaction.subscription_id = Some(subscription.id.clone());
                if let Err(e) = self.store.insert_transaction(&transaction).await {
                    tracing::warn!("Error recording payment transaction: {}", e);
                }
                subscription
            }
        };

        if subscription.user_id != user_id {
            tracing::warn!(
                "Payment {} belongs to {}, not {}",
                payment_id,
                subscription.user_id,
                user_id
            );
            return Ok(PaymentOutcome::error("payment_user_mismatch"));
        }

        if let Err(e) = self
            .store
            .upsert_subscribed(&SubscribedUpdate::from_subscription(&subscription))
            .await
        {
            tracing::error!("Error updating user subscription status: {}", e);
            return Ok(PaymentOutcome::error("subscription_sync_failed"));
        }

        tracing::info!(
            "Subscription {} active for {} until {}",
            subscription.id,
            user_id,
            subscription.expires_at.to_rfc3339()
        );
        Ok(PaymentOutcome::Success {
            subscription_id: subscription.id,
        })
    }

    fn payment_data(&self, params: &CallbackParams, source: CallbackSource) -> serde_json::Value {
        let mut data = json!({
            "txn_response_code": params.txn_response_code,
            "success": params.success.as_deref() == Some("true"),
        });
        if source == CallbackSource::Fallback {
            data["fallback"] = json!(true);
        }
        data
    }
}
