use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

const DEFAULT_BASE_URL: &str = "https://api.guardx.app";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Backend endpoint configuration, persisted as a small JSON file next to
/// the profile store. Missing or unreadable files fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let raw = match fs::read_to_string(path) {
            Ok(value) => value,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let content = serde_json::to_string_pretty(self).map_err(SyncError::storage)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ApiConfig::load(Path::new("/nonexistent/api.json"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.json");
        let config = ApiConfig {
            base_url: "https://staging.guardx.app".to_string(),
            timeout_secs: 10,
        };
        config.save(&path).unwrap();
        let loaded = ApiConfig::load(&path);
        assert_eq!(loaded.base_url, config.base_url);
        assert_eq!(loaded.timeout_secs, 10);
    }
}
