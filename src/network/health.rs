//! Network health probing and caching

use super::swr::StaleWhileRevalidate;
use super::{Network, NetworkStatus};
use crate::clock::Clock;
use crate::config::CachePolicy;
use crate::node::NodeError;
use crate::storage::StorageBackend;
use crate::Error;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Version calls used to decide whether a network is reachable
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn node_version(&self, network: &Network) -> Result<String, NodeError>;
    async fn explorer_version(&self, network: &Network) -> Result<String, NodeError>;
}

/// Probe a network without caching. Any failure reads as unhealthy.
pub async fn probe_network(probe: &dyn HealthProbe, network: &Network) -> bool {
    let versions = async {
        let node = probe.node_version(network).await?;
        let explorer = probe.explorer_version(network).await?;
        Ok::<_, NodeError>((node, explorer))
    };

    match versions.await {
        Ok((node, explorer)) => !node.is_empty() && !explorer.is_empty(),
        Err(e) => {
            let err = Error::NetworkUnhealthy(network.id.clone());
            debug!(error = %err, cause = %e, "Exception when checking network health");
            false
        }
    }
}

/// Health of every configured network behind a stale-while-revalidate cache
#[derive(Clone)]
pub struct NetworkHealthCache {
    probe: Arc<dyn HealthProbe>,
    cache: StaleWhileRevalidate<bool>,
}

impl NetworkHealthCache {
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        backend: Arc<dyn StorageBackend>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            probe,
            cache: StaleWhileRevalidate::new(backend, policy, clock),
        }
    }

    fn cache_key(network: &Network) -> String {
        format!("network-status:{}", network.id)
    }

    /// Cached health of one network
    pub async fn is_healthy(&self, network: &Network) -> bool {
        let probe = Arc::clone(&self.probe);
        let target = network.clone();
        self.cache
            .get(&Self::cache_key(network), move || async move {
                probe_network(probe.as_ref(), &target).await
            })
            .await
    }

    pub async fn get_network_status(&self, network: &Network) -> NetworkStatus {
        NetworkStatus {
            network_id: network.id.clone(),
            healthy: self.is_healthy(network).await,
        }
    }

    /// Probe all networks concurrently. One network's failure never
    /// affects another's result.
    pub async fn get_network_statuses(&self, networks: &[Network]) -> HashMap<String, NetworkStatus> {
        let statuses =
            futures::future::join_all(networks.iter().map(|n| self.get_network_status(n))).await;

        statuses
            .into_iter()
            .map(|status| (status.network_id.clone(), status))
            .collect()
    }
}
