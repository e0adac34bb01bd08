pub mod account;
pub mod auth;
pub mod documents;
mod extract;
pub mod health;
pub mod payments;
pub mod site;
