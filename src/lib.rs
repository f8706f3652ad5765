//! Core library for the GuardX VPN client.
//!
//! Covers everything between the Telegram-auth hand-off and the proxy
//! engine: extracting the bearer token from the auth deep link, storing it,
//! fetching the server directory and subscription state from the backend,
//! deriving a `vless://` share link per server record, and importing the
//! links into the local profile store the engine reads. Tunneling itself
//! lives in the external engine and is out of scope here.

pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod link;
pub mod profile;
pub mod sync;

pub use api::client::{DirectoryApi, HttpDirectoryClient};
pub use api::models::{ServerRecord, SubscriptionRecord};
pub use config::ApiConfig;
pub use credentials::CredentialStore;
pub use error::SyncError;
pub use link::share_link;
pub use profile::{ProfileImporter, ProfileStore};
pub use sync::{SyncManager, SyncReport, DEFAULT_GROUP};
