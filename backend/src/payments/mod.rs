//! Checkout and gateway redirects.

mod client;
mod processor;
mod signature;

pub use client::{PaymentClient, PaymentError};
pub use processor::{CallbackParams, CallbackSource, PaymentProcessor};
pub use signature::SignatureVerifier;
