use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

const CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredCredential {
    token: Option<String>,
}

/// Durable store for the single bearer token of this installation.
///
/// At most one token is active; an absent or empty token means logged out.
/// Re-login overwrites the token in place, there is no intermediate state.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CREDENTIALS_FILE),
        }
    }

    pub fn save_token(&self, token: &str) -> Result<(), SyncError> {
        self.write(&StoredCredential {
            token: Some(token.to_string()),
        })?;
        debug!("token saved");
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        if !self.path.exists() {
            return None;
        }
        let raw = fs::read_to_string(&self.path).ok()?;
        let stored: StoredCredential = serde_json::from_str(&raw).unwrap_or_default();
        stored.token.filter(|token| !token.trim().is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn clear_token(&self) -> Result<(), SyncError> {
        self.write(&StoredCredential::default())?;
        debug!("token cleared");
        Ok(())
    }

    fn write(&self, stored: &StoredCredential) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(stored).map_err(SyncError::storage)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
