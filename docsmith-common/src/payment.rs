//! Remote payment API bodies and the outcome of a payment redirect.

use serde::{Deserialize, Serialize};

/// Body of `POST /create-payment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    /// Price in major currency units.
    pub amount: f64,
    pub redirection_url: String,
}

/// Response of `POST /create-payment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub payment_url: String,
}

/// Result of handling a gateway redirect, rendered into the query string of
/// the page the browser lands on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "payment", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success { subscription_id: String },
    Failed { reason: String },
    Error { reason: String },
}

impl PaymentOutcome {
    pub fn error(reason: &str) -> Self {
        PaymentOutcome::Error {
            reason: reason.to_string(),
        }
    }

    /// Value of the `payment` query parameter.
    pub fn status(&self) -> &'static str {
        match self {
            PaymentOutcome::Success { .. } => "success",
            PaymentOutcome::Failed { .. } => "failed",
            PaymentOutcome::Error { .. } => "error",
        }
    }

    /// Query parameters in the order they appear in the redirect.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            PaymentOutcome::Success { subscription_id } => {
                vec![("payment", self.status()), ("subscription_id", subscription_id)]
            }
            PaymentOutcome::Failed { reason } | PaymentOutcome::Error { reason } => {
                vec![("payment", self.status()), ("reason", reason)]
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Success { .. })
    }
}
