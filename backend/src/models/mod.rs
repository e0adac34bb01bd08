pub mod billing;
pub mod document;

pub use billing::{
    PaymentTransaction, Subscription, SubscribedUpdate, TransactionStatus, TrialUpdate, UserSubscription,
};
pub use document::DocumentUsage;
