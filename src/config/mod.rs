//! Configuration for the wallet background service

pub mod endpoints;

use crate::network::Network;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use endpoints::{EndpointOverrides, PRIVATE_KEY_ENV};

/// Stale-while-revalidate bounds for the network health cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Entries younger than this are served without probing
    pub min_time_to_stale_ms: u64,
    /// Entries at least this old are never served
    pub max_time_to_live_ms: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            min_time_to_stale_ms: 60_000,       // 1 minute
            max_time_to_live_ms: 30 * 60_000,   // 30 minutes
        }
    }
}

impl CachePolicy {
    pub fn min_time_to_stale(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.min_time_to_stale_ms as i64)
    }

    pub fn max_time_to_live(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.max_time_to_live_ms as i64)
    }
}

/// Transaction status polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Delay between two status polls (milliseconds)
    pub polling_interval_ms: u64,
    /// Consecutive "not found" answers tolerated before giving up
    pub not_found_retry_limit: u32,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            polling_interval_ms: 3_000,
            not_found_retry_limit: 3,
        }
    }
}

impl TrackingSettings {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}

/// Durable storage location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding one JSON file per storage namespace
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".wallet-background"),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Networks the wallet can talk to
    pub networks: Vec<Network>,
    /// Storage settings
    pub storage: StorageSettings,
    /// Network health cache policy
    pub cache: CachePolicy,
    /// Transaction tracking settings
    pub tracking: TrackingSettings,
    /// Timeout for node and explorer version probes (milliseconds)
    pub probe_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            networks: Network::defaults(),
            storage: StorageSettings::default(),
            cache: CachePolicy::default(),
            tracking: TrackingSettings::default(),
            probe_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load a JSON config file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| Error::Config(e.to_string()))?;
                serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
            }
            None => Config::default(),
        };

        config.apply_env_overrides(&EndpointOverrides::from_env(&config.networks));
        config.validate()?;
        Ok(config)
    }

    /// Replace node and explorer URLs with any overrides found
    pub fn apply_env_overrides(&mut self, overrides: &EndpointOverrides) {
        for network in &mut self.networks {
            if let Some(url) = overrides.node_url(&network.id) {
                network.node_url = url.to_string();
            }
            if let Some(url) = overrides.explorer_api_url(&network.id) {
                network.explorer_api_url = url.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for network in &self.networks {
            if network.id.trim().is_empty() {
                return Err(Error::Config("network id must not be empty".to_string()));
            }
            if !seen.insert(network.id.as_str()) {
                return Err(Error::Config(format!("duplicate network id {}", network.id)));
            }
            for url in [&network.node_url, &network.explorer_api_url] {
                url::Url::parse(url).map_err(|e| {
                    Error::Config(format!("invalid url {} for {}: {}", url, network.id, e))
                })?;
            }
        }

        if self.cache.min_time_to_stale_ms >= self.cache.max_time_to_live_ms {
            return Err(Error::Config(
                "cache.min_time_to_stale_ms must be below cache.max_time_to_live_ms".to_string(),
            ));
        }
        if self.tracking.polling_interval_ms == 0 {
            return Err(Error::Config(
                "tracking.polling_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn network(&self, id: &str) -> Result<&Network> {
        self.networks
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::UnknownNetwork(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_fall_back_to_defaults() {
        let value = serde_json::json!({
            "tracking": { "polling_interval_ms": 500 }
        });
        let parsed: Config = serde_json::from_value(value).expect("parse config");
        assert_eq!(parsed.tracking.polling_interval_ms, 500);
        assert_eq!(parsed.tracking.not_found_retry_limit, 3);
        assert_eq!(parsed.cache, CachePolicy::default());
        assert_eq!(parsed.networks.len(), 3);
        parsed.validate().expect("valid");
    }

    #[test]
    fn validate_rejects_inverted_cache_policy() {
        let config = Config {
            cache: CachePolicy {
                min_time_to_stale_ms: 10,
                max_time_to_live_ms: 10,
            },
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_duplicate_networks() {
        let mut config = Config::default();
        config.networks.push(config.networks[0].clone());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate network id"));
    }

    #[test]
    fn validate_rejects_bad_urls() {
        let mut config = Config::default();
        config.networks[0].node_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_replace_urls() {
        let mut config = Config::default();
        let overrides = EndpointOverrides::default()
            .with_node_url("testnet", "http://localhost:22973")
            .with_explorer_api_url("testnet", "http://localhost:9090");
        config.apply_env_overrides(&overrides);

        let testnet = config.network("testnet").unwrap();
        assert_eq!(testnet.node_url, "http://localhost:22973");
        assert_eq!(testnet.explorer_api_url, "http://localhost:9090");
        assert_ne!(config.network("mainnet").unwrap().node_url, testnet.node_url);
    }

    #[test]
    fn unknown_network_lookup_fails() {
        let config = Config::default();
        assert!(matches!(
            config.network("nope"),
            Err(Error::UnknownNetwork(id)) if id == "nope"
        ));
    }
}
