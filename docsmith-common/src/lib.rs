//! docsmith common types
//!
//! Shared request/response bodies for the remote document and payment APIs,
//! plus the entitlement and payment-outcome views handed to the browser.

pub mod document;
pub mod entitlement;
pub mod payment;

pub use document::{GenerateDocumentRequest, GenerateDocumentResponse};
pub use entitlement::{EntitlementKind, EntitlementStatus};
pub use payment::{CreatePaymentRequest, CreatePaymentResponse, PaymentOutcome};
