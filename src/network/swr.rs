//! Stale-while-revalidate cache
//!
//! - fresh (`age < min_time_to_stale`): served as is
//! - stale (`min_time_to_stale <= age < max_time_to_live`): served, and a
//!   background fetch replaces it for later callers
//! - expired (`age >= max_time_to_live`) or missing: the caller waits for
//!   a fetch

use crate::clock::Clock;
use crate::config::CachePolicy;
use crate::storage::{KeyValueStore, StorageBackend};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const SWR_NAMESPACE: &str = "cache:swr";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl<V> CacheEntry<V> {
    pub fn freshness(&self, now: DateTime<Utc>, policy: &CachePolicy) -> Freshness {
        let age = now - self.fetched_at;
        if age < policy.min_time_to_stale() {
            Freshness::Fresh
        } else if age < policy.max_time_to_live() {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

type Entries<V> = HashMap<String, CacheEntry<V>>;

pub struct StaleWhileRevalidate<V> {
    entries: KeyValueStore<Entries<V>>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    /// Keys with a background refresh in flight
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl<V> Clone for StaleWhileRevalidate<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            policy: self.policy,
            clock: Arc::clone(&self.clock),
            refreshing: Arc::clone(&self.refreshing),
        }
    }
}

impl<V> StaleWhileRevalidate<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(backend: Arc<dyn StorageBackend>, policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: KeyValueStore::new(backend, SWR_NAMESPACE),
            policy,
            clock,
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Cached value for `key`, fetching according to the entry's freshness
    pub async fn get<F, Fut>(&self, key: &str, fetch: F) -> V
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = V> + Send + 'static,
    {
        if let Some(entry) = self.entry(key).await {
            match entry.freshness(self.clock.now(), &self.policy) {
                Freshness::Fresh => {
                    debug!(key, "Cache hit");
                    return entry.value;
                }
                Freshness::Stale => {
                    debug!(key, "Stale cache hit, revalidating");
                    self.revalidate_in_background(key, fetch);
                    return entry.value;
                }
                Freshness::Expired => {
                    debug!(key, "Cache entry expired");
                }
            }
        }

        self.fetch_and_store(key, fetch).await
    }

    pub async fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries
            .get()
            .await
            .and_then(|mut entries| entries.remove(key))
    }

    async fn fetch_and_store<F, Fut>(&self, key: &str, fetch: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let value = fetch().await;
        let entry = CacheEntry {
            value: value.clone(),
            fetched_at: self.clock.now(),
        };

        let result = self
            .entries
            .update(|current| {
                let mut entries = current.unwrap_or_default();
                entries.insert(key.to_string(), entry);
                entries
            })
            .await;
        if let Err(e) = result {
            warn!(key, error = %e, "Failed to persist cache entry");
        }

        value
    }

    fn revalidate_in_background<F, Fut>(&self, key: &str, fetch: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = V> + Send + 'static,
    {
        {
            let mut refreshing = self.refreshing.lock().unwrap_or_else(|p| p.into_inner());
            if !refreshing.insert(key.to_string()) {
                return;
            }
        }

        let this = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            this.fetch_and_store(&key, fetch).await;
            this.refreshing
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .remove(&key);
        });
    }
}
