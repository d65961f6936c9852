//! Endpoint overrides from the environment
//!
//! Per-network environment variables take priority over the config file:
//!
//! ```bash
//! export MAINNET_NODE_URL="https://my-node.example.org"
//! export MAINNET_EXPLORER_API_URL="https://my-explorer-backend.example.org"
//! export DEVNET_NODE_URL="http://127.0.0.1:22973"
//! ```
//!
//! The variable prefix is the upper-cased network id with `-` mapped to `_`.

use crate::network::Network;
use std::collections::HashMap;

/// Environment variable holding the hex-encoded signing key
pub const PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";

const NODE_URL_SUFFIX: &str = "_NODE_URL";
const EXPLORER_API_URL_SUFFIX: &str = "_EXPLORER_API_URL";

/// Node and explorer URL overrides indexed by network id
#[derive(Debug, Clone, Default)]
pub struct EndpointOverrides {
    node_urls: HashMap<String, String>,
    explorer_api_urls: HashMap<String, String>,
}

impl EndpointOverrides {
    /// Collect overrides for the given networks from the environment
    pub fn from_env(networks: &[Network]) -> Self {
        let mut overrides = Self::default();

        for network in networks {
            let prefix = env_prefix(&network.id);

            if let Ok(url) = std::env::var(format!("{prefix}{NODE_URL_SUFFIX}")) {
                tracing::debug!(network = %network.id, "Using node url from environment");
                overrides.node_urls.insert(network.id.clone(), url);
            }
            if let Ok(url) = std::env::var(format!("{prefix}{EXPLORER_API_URL_SUFFIX}")) {
                tracing::debug!(network = %network.id, "Using explorer api url from environment");
                overrides.explorer_api_urls.insert(network.id.clone(), url);
            }
        }

        overrides
    }

    pub fn with_node_url(mut self, network_id: &str, url: &str) -> Self {
        self.node_urls
            .insert(network_id.to_string(), url.to_string());
        self
    }

    pub fn with_explorer_api_url(mut self, network_id: &str, url: &str) -> Self {
        self.explorer_api_urls
            .insert(network_id.to_string(), url.to_string());
        self
    }

    pub fn node_url(&self, network_id: &str) -> Option<&str> {
        self.node_urls.get(network_id).map(|s| s.as_str())
    }

    pub fn explorer_api_url(&self, network_id: &str) -> Option<&str> {
        self.explorer_api_urls.get(network_id).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.node_urls.is_empty() && self.explorer_api_urls.is_empty()
    }
}

fn env_prefix(network_id: &str) -> String {
    network_id.to_uppercase().replace('-', "_")
}
