//! Remote directory client for the GuardX backend.

pub mod client;
pub mod models;

pub use client::{DirectoryApi, HttpDirectoryClient};
pub use models::{ServerRecord, SubscriptionRecord};
