use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::StatusCode;

use crate::api::models::{ServerRecord, SubscriptionEnvelope, SubscriptionRecord};
use crate::config::ApiConfig;
use crate::error::SyncError;

const SERVERS_PATH: &str = "/api/mobile/servers";
const SUBSCRIPTIONS_PATH: &str = "/api/mobile/subscriptions";

/// Read-only view of the backend directory.
///
/// The orchestrator is generic over this trait so tests can drive the
/// pipeline with an in-memory directory.
#[async_trait]
pub trait DirectoryApi {
    async fn fetch_servers(&self, token: &str) -> Result<Vec<ServerRecord>, SyncError>;

    /// `Ok(None)` means "no active plan"; callers check the credential
    /// store separately to distinguish "not authenticated".
    async fn fetch_subscription(
        &self,
        token: &str,
    ) -> Result<Option<SubscriptionRecord>, SyncError>;
}

/// HTTP client for the GuardX backend, authenticated by bearer token.
pub struct HttpDirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectoryClient {
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str, token: &str) -> Result<reqwest::Response, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!("{path}: backend rejected the token ({status})");
            return Err(SyncError::Unauthorized);
        }
        Ok(response)
    }
}

#[async_trait]
impl DirectoryApi for HttpDirectoryClient {
    async fn fetch_servers(&self, token: &str) -> Result<Vec<ServerRecord>, SyncError> {
        let response = self.get(SERVERS_PATH, token).await?;
        let status = response.status();
        if !status.is_success() {
            error!("{SERVERS_PATH}: backend returned {status}");
            return Err(SyncError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let servers: Vec<ServerRecord> = serde_json::from_str(&body).map_err(|e| {
            error!("{SERVERS_PATH}: malformed body: {e}");
            SyncError::MalformedResponse(e.to_string())
        })?;
        if servers.is_empty() {
            // A degenerate list would silently clear the profile UI, so it
            // counts as a failure rather than a successful empty sync.
            return Err(SyncError::EmptyResult);
        }
        debug!("received {} servers", servers.len());
        Ok(servers)
    }

    async fn fetch_subscription(
        &self,
        token: &str,
    ) -> Result<Option<SubscriptionRecord>, SyncError> {
        let response = self.get(SUBSCRIPTIONS_PATH, token).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            error!("{SUBSCRIPTIONS_PATH}: backend returned {status}");
            return Err(SyncError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let envelope: SubscriptionEnvelope = serde_json::from_str(&body).map_err(|e| {
            error!("{SUBSCRIPTIONS_PATH}: malformed body: {e}");
            SyncError::MalformedResponse(e.to_string())
        })?;
        Ok(envelope.subscription)
    }
}
