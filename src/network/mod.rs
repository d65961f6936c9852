//! Networks and their health
//!
//! Health is best-effort: probe failures become `healthy: false`, and the
//! result is cached with a stale-while-revalidate policy so callers rarely
//! wait on the network.

mod health;
mod swr;

pub use health::{HealthProbe, NetworkHealthCache};
pub use swr::{CacheEntry, Freshness, StaleWhileRevalidate};

use serde::{Deserialize, Serialize};

/// Connection details for one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub id: String,
    pub name: String,
    /// Base URL of the full node REST API
    pub node_url: String,
    /// Base URL of the explorer backend API
    pub explorer_api_url: String,
    /// Public explorer front-end, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

impl Network {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        node_url: impl Into<String>,
        explorer_api_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_url: node_url.into(),
            explorer_api_url: explorer_api_url.into(),
            explorer_url: None,
        }
    }

    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }

    /// Built-in networks
    pub fn defaults() -> Vec<Network> {
        vec![
            Network::new(
                "mainnet",
                "Mainnet",
                "https://node.mainnet.alephium.org",
                "https://backend.mainnet.alephium.org",
            )
            .with_explorer_url("https://explorer.alephium.org"),
            Network::new(
                "testnet",
                "Testnet",
                "https://node.testnet.alephium.org",
                "https://backend.testnet.alephium.org",
            )
            .with_explorer_url("https://testnet.alephium.org"),
            Network::new(
                "devnet",
                "Devnet",
                "http://127.0.0.1:22973",
                "http://127.0.0.1:9090",
            ),
        ]
    }
}

/// Health of a network at the time it was last probed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    #[serde(rename = "id")]
    pub network_id: String,
    pub healthy: bool,
}
