mod client;

pub use client::{DocumentClient, DocumentError, GeneratedDocument};
