//! Durable transaction collection

use super::model::{
    transactions_equal, StatusSummary, Transaction, TransactionFailure, TransactionStatus,
};
use crate::accounts::{accounts_equal, BaseAccount};
use crate::storage::{ArrayStore, StorageBackend, Subscription};
use crate::Result;
use std::sync::Arc;

pub const TRANSACTIONS_NAMESPACE: &str = "core:transactions";

/// A status change to persist on an existing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
    pub block_hash: Option<String>,
    pub failure: Option<TransactionFailure>,
}

impl StatusUpdate {
    pub fn to(status: TransactionStatus) -> Self {
        Self {
            status,
            block_hash: None,
            failure: None,
        }
    }
}

#[derive(Clone)]
pub struct TransactionStore {
    store: ArrayStore<Transaction>,
}

impl TransactionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            store: ArrayStore::new(backend, TRANSACTIONS_NAMESPACE, transactions_equal),
        }
    }

    /// Record a transaction. Returns false if it was already recorded.
    pub async fn add(&self, transaction: Transaction) -> Result<bool> {
        Ok(!self.store.push(vec![transaction]).await?.is_empty())
    }

    pub async fn get(&self, hash: &str, network_id: &str) -> Option<Transaction> {
        self.store
            .get_where(|t| t.hash == hash && t.account.network_id == network_id)
            .await
            .into_iter()
            .next()
    }

    pub async fn all(&self) -> Vec<Transaction> {
        self.store.get().await
    }

    pub async fn for_account(&self, account: &BaseAccount) -> Vec<Transaction> {
        self.store
            .get_where(|t| accounts_equal(&t.account, account))
            .await
    }

    pub async fn pending_for_account(&self, account: &BaseAccount) -> Vec<Transaction> {
        self.store
            .get_where(|t| accounts_equal(&t.account, account) && !t.status.is_terminal())
            .await
    }

    /// Every transaction that has not reached a terminal status
    pub async fn unfinished(&self) -> Vec<Transaction> {
        self.store.get_where(|t| !t.status.is_terminal()).await
    }

    /// Presentation status of a transaction; `Unknown` when not recorded
    pub async fn status_summary(&self, hash: &str, network_id: &str) -> StatusSummary {
        self.get(hash, network_id)
            .await
            .map_or(StatusSummary::Unknown, |t| t.status.summary())
    }

    /// Apply a status update. Returns the updated record, or `None` when
    /// the transaction is not recorded.
    pub async fn set_status(
        &self,
        hash: &str,
        network_id: &str,
        update: &StatusUpdate,
    ) -> Result<Option<Transaction>> {
        let updated = self
            .store
            .update(
                |t| t.hash == hash && t.account.network_id == network_id,
                |t| {
                    let mut next = t.clone();
                    next.status = update.status;
                    if update.block_hash.is_some() {
                        next.block_hash = update.block_hash.clone();
                    }
                    if update.failure.is_some() {
                        next.failure = update.failure.clone();
                    }
                    next
                },
            )
            .await?;
        Ok(updated.into_iter().next())
    }

    /// Delete every record (wallet reset)
    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await?;
        Ok(())
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Transaction]) + Send + Sync + 'static,
    {
        self.store.subscribe(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::transactions::model::tests::reviewed;
    use crate::transactions::model::FailureKind;
    use chrono::Utc;

    fn tx(hash: &str, address: &str, network: &str) -> Transaction {
        Transaction::submitted(
            hash,
            BaseAccount::new(address, network),
            reviewed(address, hash),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn add_is_keyed_by_hash_and_network() {
        let store = TransactionStore::new(Arc::new(MemoryBackend::new()));
        assert!(store.add(tx("h1", "a", "mainnet")).await.unwrap());
        assert!(!store.add(tx("h1", "a", "mainnet")).await.unwrap());
        assert!(store.add(tx("h1", "a", "testnet")).await.unwrap());
        assert_eq!(store.all().await.len(), 2);
    }

    #[tokio::test]
    async fn set_status_updates_only_target() {
        let store = TransactionStore::new(Arc::new(MemoryBackend::new()));
        store.add(tx("h1", "a", "mainnet")).await.unwrap();
        store.add(tx("h2", "a", "mainnet")).await.unwrap();

        let update = StatusUpdate {
            status: TransactionStatus::Failed,
            block_hash: None,
            failure: Some(TransactionFailure {
                kind: FailureKind::NotFound,
                message: "Transaction h1 not found".to_string(),
            }),
        };
        let updated = store
            .set_status("h1", "mainnet", &update)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TransactionStatus::Failed);
        assert_eq!(updated.failure.unwrap().kind, FailureKind::NotFound);

        assert_eq!(
            store.get("h2", "mainnet").await.unwrap().status,
            TransactionStatus::Submitted
        );
        assert!(store
            .set_status("missing", "mainnet", &update)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn account_views_and_summary() {
        let store = TransactionStore::new(Arc::new(MemoryBackend::new()));
        let account = BaseAccount::new("a", "mainnet");
        store.add(tx("h1", "a", "mainnet")).await.unwrap();
        store.add(tx("h2", "a", "mainnet")).await.unwrap();
        store.add(tx("h3", "b", "mainnet")).await.unwrap();
        store
            .set_status("h2", "mainnet", &StatusUpdate::to(TransactionStatus::Confirmed))
            .await
            .unwrap();

        assert_eq!(store.for_account(&account).await.len(), 2);
        let pending = store.pending_for_account(&account).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].hash, "h1");
        assert_eq!(store.unfinished().await.len(), 2);

        assert_eq!(store.status_summary("h2", "mainnet").await, StatusSummary::Success);
        assert_eq!(store.status_summary("h1", "mainnet").await, StatusSummary::Pending);
        assert_eq!(store.status_summary("h2", "testnet").await, StatusSummary::Unknown);

        store.reset().await.unwrap();
        assert!(store.all().await.is_empty());
    }
}
