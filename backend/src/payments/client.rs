use docsmith_common::{CreatePaymentRequest, CreatePaymentResponse};
use reqwest::Client;

/// Client for the remote payment service.
pub struct PaymentClient {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Payment service error: {0}")]
    ServiceError(String),
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

impl PaymentClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start a checkout; the gateway sends the browser back to `redirection_url`.
    pub async fn create_payment(&self, amount: f64, redirection_url: &str) -> Result<CreatePaymentResponse, PaymentError> {
        let url = format!("{}/create-payment", self.base_url);
        let request = CreatePaymentRequest {
            amount,
            redirection_url: redirection_url.to_string(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::ServiceError(format!("{}: {}", status, body)));
        }

        let body: CreatePaymentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        if body.payment_url.is_empty() {
            return Err(PaymentError::InvalidResponse("empty payment_url".to_string()));
        }
        Ok(body)
    }
}
