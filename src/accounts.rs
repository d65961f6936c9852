//! Wallet accounts
//!
//! Accounts are identified by `(address, network_id)` and never patched in
//! place: changing an account means replacing its record.

use crate::storage::{ArrayStore, StorageBackend, Subscription};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ACCOUNTS_NAMESPACE: &str = "core:accounts";

/// Number of chain groups addresses are sharded into
pub const TOTAL_NUMBER_OF_GROUPS: u32 = 4;

/// Base identity shared by every account representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseAccount {
    pub address: String,
    pub network_id: String,
}

impl BaseAccount {
    pub fn new(address: impl Into<String>, network_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            network_id: network_id.into(),
        }
    }
}

impl std::fmt::Display for BaseAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.address, self.network_id)
    }
}

pub fn accounts_equal(a: &BaseAccount, b: &BaseAccount) -> bool {
    a.address == b.address && a.network_id == b.network_id
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyType {
    Default,
    Bip340Schnorr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerKind {
    LocalSecret,
}

/// How the wallet signs for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSigner {
    #[serde(rename = "type")]
    pub kind: SignerKind,
    pub key_type: KeyType,
    pub public_key: String,
    pub derivation_index: u32,
    pub group: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountType {
    #[default]
    Argent,
    ArgentPlugin,
}

/// A stored account with signing capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    #[serde(flatten)]
    pub base: BaseAccount,
    pub signer: AccountSigner,
    #[serde(rename = "type", default)]
    pub account_type: AccountType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl WalletAccount {
    pub fn address(&self) -> &str {
        &self.base.address
    }

    pub fn network_id(&self) -> &str {
        &self.base.network_id
    }
}

/// Group an address belongs to, in `0..TOTAL_NUMBER_OF_GROUPS`.
///
/// Derived from a blake3 hash of the address text. This is the wallet's
/// own partition of addresses, not the group the chain assigns from the
/// address's public key hash: a `chainGroup` filter only matches groups
/// obtained from this function.
pub fn group_of_address(address: &str) -> u32 {
    let digest = blake3::hash(address.as_bytes());
    let bytes = digest.as_bytes();
    let hint = u32::from_be_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);
    hint % TOTAL_NUMBER_OF_GROUPS
}

/// Durable list of the wallet's accounts
#[derive(Clone)]
pub struct AccountStore {
    store: ArrayStore<WalletAccount>,
}

impl AccountStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            store: ArrayStore::new(backend, ACCOUNTS_NAMESPACE, |a: &WalletAccount, b: &WalletAccount| {
                accounts_equal(&a.base, &b.base)
            }),
        }
    }

    /// Add an account. Returns false if an account with the same identity exists.
    pub async fn add(&self, account: WalletAccount) -> Result<bool> {
        Ok(!self.store.push(vec![account]).await?.is_empty())
    }

    /// Replace the stored record of an existing account
    pub async fn replace(&self, account: WalletAccount) -> Result<bool> {
        let base = account.base.clone();
        let updated = self
            .store
            .update(|a| accounts_equal(&a.base, &base), |_| account.clone())
            .await?;
        Ok(!updated.is_empty())
    }

    pub async fn all(&self) -> Vec<WalletAccount> {
        self.store.get().await
    }

    pub async fn find(&self, base: &BaseAccount) -> Option<WalletAccount> {
        self.store
            .get_where(|a| accounts_equal(&a.base, base))
            .await
            .into_iter()
            .next()
    }

    /// Non-hidden accounts on a network
    pub async fn visible(&self, network_id: &str) -> Vec<WalletAccount> {
        self.store
            .get_where(|a| !a.hidden && a.base.network_id == network_id)
            .await
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[WalletAccount]) + Send + Sync + 'static,
    {
        self.store.subscribe(callback)
    }
}
