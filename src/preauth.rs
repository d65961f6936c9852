//! Pre-authorization registry
//!
//! Durable allow-list of `(account, host)` pairs: a host may request
//! signatures for an account only while a matching entry exists. The list
//! is checked on every request and never cached by callers.

use crate::accounts::{accounts_equal, group_of_address, AccountStore, BaseAccount};
use crate::storage::{ArrayStore, KeyValueStore, StorageBackend, Subscription};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PREAUTHORIZATIONS_NAMESPACE: &str = "core:whitelist";

/// Flat host list written by earlier versions of the wallet
pub const LEGACY_PREAUTHORIZATIONS_KEY: &str = "PREAUTHORIZATION:APPROVED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreAuthorization {
    pub account: BaseAccount,
    pub host: String,
}

impl PreAuthorization {
    pub fn new(account: BaseAccount, host: impl Into<String>) -> Self {
        Self {
            account,
            host: host.into(),
        }
    }
}

pub fn equal_preauthorization(a: &PreAuthorization, b: &PreAuthorization) -> bool {
    accounts_equal(&a.account, &b.account) && a.host == b.host
}

/// Authorization query from a page. `host` is mandatory; every other field
/// narrows the match only when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_group: Option<u32>,
}

impl RequestOptions {
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Query pinned to one account
    pub fn for_account(host: impl Into<String>, account: &BaseAccount) -> Self {
        Self {
            host: host.into(),
            network_id: Some(account.network_id.clone()),
            address: Some(account.address.clone()),
            chain_group: None,
        }
    }

    pub fn matches(&self, entry: &PreAuthorization) -> bool {
        entry.host == self.host
            && self
                .network_id
                .as_ref()
                .map_or(true, |id| &entry.account.network_id == id)
            && self
                .address
                .as_ref()
                .map_or(true, |address| &entry.account.address == address)
            && self
                .chain_group
                .map_or(true, |group| group_of_address(&entry.account.address) == group)
    }
}

/// Legacy record: either a host array or that array JSON-encoded in a string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LegacyHosts {
    List(Vec<String>),
    Encoded(String),
}

impl LegacyHosts {
    fn into_hosts(self) -> Option<Vec<String>> {
        match self {
            LegacyHosts::List(hosts) => Some(hosts),
            LegacyHosts::Encoded(raw) => match serde_json::from_str(&raw) {
                Ok(hosts) => Some(hosts),
                Err(e) => {
                    warn!(error = %e, "Legacy pre-authorization record is not a host list");
                    None
                }
            },
        }
    }
}

#[derive(Clone)]
pub struct PreAuthorizationRegistry {
    store: ArrayStore<PreAuthorization>,
    legacy: KeyValueStore<LegacyHosts>,
    accounts: AccountStore,
}

impl PreAuthorizationRegistry {
    pub fn new(backend: Arc<dyn StorageBackend>, accounts: AccountStore) -> Self {
        Self {
            store: ArrayStore::new(
                Arc::clone(&backend),
                PREAUTHORIZATIONS_NAMESPACE,
                equal_preauthorization,
            ),
            legacy: KeyValueStore::new(backend, LEGACY_PREAUTHORIZATIONS_KEY),
            accounts,
        }
    }

    /// Allow `host` to request signatures for `account`. Idempotent.
    pub async fn authorize(&self, account: BaseAccount, host: &str) -> Result<()> {
        let added = self
            .store
            .push(vec![PreAuthorization::new(account.clone(), host)])
            .await?;
        if !added.is_empty() {
            info!(%host, %account, "Pre-authorized host");
        }
        Ok(())
    }

    /// Revoke `host` for one account, or for every account when `account`
    /// is `None`
    pub async fn revoke(&self, host: &str, account: Option<&BaseAccount>) -> Result<()> {
        let removed = self
            .store
            .remove(|entry| match account {
                Some(account) => {
                    equal_preauthorization(entry, &PreAuthorization::new(account.clone(), host))
                }
                None => entry.host == host,
            })
            .await?;
        if !removed.is_empty() {
            info!(%host, count = removed.len(), "Revoked pre-authorizations");
        }
        Ok(())
    }

    /// True when at least one entry satisfies every filter in `options`
    pub async fn is_authorized(&self, options: &RequestOptions) -> bool {
        let authorized = !self
            .store
            .get_where(|entry| options.matches(entry))
            .await
            .is_empty();
        debug!(host = %options.host, authorized, "Checked pre-authorization");
        authorized
    }

    /// Exact check for one (account, host) pair
    pub async fn is_preauthorized(&self, host: &str, account: &BaseAccount) -> bool {
        let wanted = PreAuthorization::new(account.clone(), host);
        !self
            .store
            .get_where(|entry| equal_preauthorization(entry, &wanted))
            .await
            .is_empty()
    }

    pub async fn list_authorizations(&self) -> Vec<PreAuthorization> {
        self.store.get().await
    }

    /// First entry for `host`, if any
    pub async fn lookup(&self, host: &str) -> Option<PreAuthorization> {
        self.store
            .get_where(|entry| entry.host == host)
            .await
            .into_iter()
            .next()
    }

    /// Remove every pre-authorization
    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await?;
        Ok(())
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[PreAuthorization]) + Send + Sync + 'static,
    {
        self.store.subscribe(callback)
    }

    /// Expand the legacy host list into one entry per known account and
    /// delete it. Returns the number of entries added. Re-running after the
    /// legacy record is gone does nothing.
    pub async fn migrate_legacy(&self) -> Result<usize> {
        let hosts = match self.legacy.get().await {
            Some(legacy) => legacy.into_hosts(),
            None => return Ok(0),
        };
        let Some(hosts) = hosts else {
            return Ok(0);
        };

        let mut added = 0;
        if !hosts.is_empty() {
            let accounts = self.accounts.all().await;
            let combinations: Vec<PreAuthorization> = hosts
                .iter()
                .flat_map(|host| {
                    accounts
                        .iter()
                        .map(move |account| PreAuthorization::new(account.base.clone(), host.clone()))
                })
                .collect();
            added = self.store.push(combinations).await?.len();
        }

        // only after the new entries are durable
        self.legacy.clear().await?;
        info!(hosts = hosts.len(), added, "Migrated legacy pre-authorizations");
        Ok(added)
    }
}
