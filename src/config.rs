//! Configuration Management
//!
//! Optional user defaults for azure-carbon, read from
//! `<config dir>/azure-carbon/config.json`. The file is never written.

use crate::azure::auth::DEFAULT_BASE_ADDRESS;
use crate::azure::http::RetryPolicy;
use crate::carbon::DEFAULT_PAGE_SIZE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// User configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Subscription to query when `--subscription` is not given
    #[serde(default)]
    pub subscription_id: Option<Uuid>,
    /// Management API base address
    #[serde(default)]
    pub carbon_api_address: Option<String>,
    /// Rows per emissions page
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Retries for throttled / unavailable responses
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("azure-carbon").join("config.json"))
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config file {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Could not read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Get effective API address (CLI > config > default)
    pub fn effective_api_address(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.carbon_api_address.clone())
            .unwrap_or_else(|| DEFAULT_BASE_ADDRESS.to_string())
    }

    /// Get effective page size (CLI > config > default)
    pub fn effective_page_size(&self, cli: Option<u32>) -> u32 {
        cli.or(self.page_size).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Retry policy with the configured retry count
    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(default.max_retries),
            ..default
        }
    }

    /// Get effective subscription (CLI > config > environment / az CLI)
    pub async fn effective_subscription(&self, cli: Option<Uuid>) -> Option<Uuid> {
        if let Some(id) = cli.or(self.subscription_id) {
            return Some(id);
        }
        crate::azure::auth::get_default_subscription().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "azure-carbon-{}-{}.json",
            name,
            Uuid::new_v4()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join(format!("azure-carbon-missing-{}.json", Uuid::new_v4()));
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_load_partial_config() {
        let path = temp_config(
            "partial",
            r#"{"subscription_id": "00000000-0000-0000-0000-000000000007", "page_size": 100}"#,
        );
        let config = Config::load_from(&path);
        std::fs::remove_file(&path).ok();

        assert_eq!(
            config.subscription_id.map(|id| id.to_string()).as_deref(),
            Some("00000000-0000-0000-0000-000000000007")
        );
        assert_eq!(config.effective_page_size(None), 100);
        assert_eq!(config.effective_page_size(Some(5)), 5);
        assert_eq!(config.carbon_api_address, None);
    }

    #[test]
    fn test_malformed_file_is_default() {
        let path = temp_config("malformed", "{ not json");
        let config = Config::load_from(&path);
        std::fs::remove_file(&path).ok();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_effective_api_address_precedence() {
        let config = Config {
            carbon_api_address: Some("https://config.example/".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.effective_api_address(Some("https://cli.example/")),
            "https://cli.example/"
        );
        assert_eq!(config.effective_api_address(None), "https://config.example/");
        assert_eq!(
            Config::default().effective_api_address(None),
            DEFAULT_BASE_ADDRESS
        );
    }

    #[test]
    fn test_retry_policy_override() {
        let config = Config {
            max_retries: Some(7),
            ..Config::default()
        };
        assert_eq!(config.retry_policy().max_retries, 7);
        assert_eq!(
            config.retry_policy().max_delay,
            RetryPolicy::default().max_delay
        );
    }

    #[tokio::test]
    async fn test_cli_subscription_wins() {
        let cli = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let config = Config {
            subscription_id: Some(Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap()),
            ..Config::default()
        };
        assert_eq!(config.effective_subscription(Some(cli)).await, Some(cli));
        assert_eq!(
            config.effective_subscription(None).await,
            config.subscription_id
        );
    }
}
