//! Signatures on gateway redirects.
//!
//! Two checks guard a callback. The gateway signs its own fields with the
//! secret shared with us (`hmac` parameter, HMAC-SHA512). The `user_id` we put
//! into the redirection URL carries our own HMAC-SHA256 (`state` parameter),
//! so the user a payment is credited to cannot be swapped.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use super::client::PaymentError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

#[derive(Clone)]
pub struct SignatureVerifier {
    gateway_mac: HmacSha512,
    state_mac: HmacSha256,
}

impl SignatureVerifier {
    pub fn new(gateway_secret: &str, state_secret: &str) -> Result<Self, PaymentError> {
        let gateway_mac = HmacSha512::new_from_slice(gateway_secret.as_bytes())
            .map_err(|e| PaymentError::InvalidKey(e.to_string()))?;
        let state_mac = HmacSha256::new_from_slice(state_secret.as_bytes())
            .map_err(|e| PaymentError::InvalidKey(e.to_string()))?;
        Ok(Self { gateway_mac, state_mac })
    }

    /// Signature over the gateway fields, concatenated in lexicographic key
    /// order: `amount_cents`, `id`, `success`, `txn_response_code`.
    pub fn gateway_signature(&self, amount_cents: &str, id: &str, success: &str, txn_response_code: &str) -> String {
        let mut mac = self.gateway_mac.clone();
        for field in [amount_cents, id, success, txn_response_code] {
            mac.update(field.as_bytes());
        }
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify_gateway(
        &self,
        amount_cents: &str,
        id: &str,
        success: &str,
        txn_response_code: &str,
        signature: &str,
    ) -> bool {
        let expected = self.gateway_signature(amount_cents, id, success, txn_response_code);
        constant_time_eq(&expected, signature)
    }

    /// Token binding `user_id` to a checkout we started.
    pub fn state_token(&self, user_id: &str) -> String {
        let mut mac = self.state_mac.clone();
        mac.update(user_id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn verify_state(&self, user_id: &str, token: &str) -> bool {
        constant_time_eq(&self.state_token(user_id), token)
    }
}

fn constant_time_eq(expected: &str, provided: &str) -> bool {
    let provided = provided.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}
