//! Polling of submitted transactions until they reach a terminal status

use super::model::{FailureKind, TransactionFailure, TransactionStatus};
use super::store::{StatusUpdate, TransactionStore};
use crate::config::TrackingSettings;
use crate::network::Network;
use crate::node::{NodeClient, NodeError, TxStatus};
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Pure status transitions driven by node poll results
#[derive(Debug, Clone)]
pub struct StatusMachine {
    hash: String,
    status: TransactionStatus,
    not_found: u32,
    retry_limit: u32,
}

impl StatusMachine {
    pub fn new(hash: impl Into<String>, status: TransactionStatus, retry_limit: u32) -> Self {
        Self {
            hash: hash.into(),
            status,
            not_found: 0,
            retry_limit,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Consecutive not-found responses since the last sighting
    pub fn not_found_count(&self) -> u32 {
        self.not_found
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one poll result. Returns the status updates to persist, in order.
    pub fn on_poll(&mut self, result: std::result::Result<TxStatus, NodeError>) -> Vec<StatusUpdate> {
        let mut updates = Vec::new();
        if self.is_finished() {
            return updates;
        }

        match result {
            Ok(TxStatus::Confirmed { block_hash, .. }) => {
                self.not_found = 0;
                // NotFoundRetrying only leaves through Pending
                if self.status == TransactionStatus::NotFoundRetrying {
                    self.move_to(StatusUpdate::to(TransactionStatus::Pending), &mut updates);
                }
                self.move_to(
                    StatusUpdate {
                        status: TransactionStatus::Confirmed,
                        block_hash: Some(block_hash),
                        failure: None,
                    },
                    &mut updates,
                );
            }
            Ok(TxStatus::MemPooled) => {
                self.not_found = 0;
                if self.status != TransactionStatus::Pending {
                    self.move_to(StatusUpdate::to(TransactionStatus::Pending), &mut updates);
                }
            }
            Ok(TxStatus::TxNotFound) => {
                self.not_found += 1;
                if self.not_found > self.retry_limit {
                    self.move_to(
                        Self::failed(
                            FailureKind::NotFound,
                            format!("Transaction {} not found", self.hash),
                        ),
                        &mut updates,
                    );
                } else if self.status == TransactionStatus::Submitted {
                    self.move_to(
                        StatusUpdate::to(TransactionStatus::NotFoundRetrying),
                        &mut updates,
                    );
                }
            }
            Err(e) => {
                self.move_to(Self::failed(FailureKind::Node, e.detail()), &mut updates);
            }
        }

        updates
    }

    fn failed(kind: FailureKind, message: String) -> StatusUpdate {
        StatusUpdate {
            status: TransactionStatus::Failed,
            block_hash: None,
            failure: Some(TransactionFailure { kind, message }),
        }
    }

    fn move_to(&mut self, update: StatusUpdate, updates: &mut Vec<StatusUpdate>) {
        debug_assert!(
            self.status.can_transition_to(update.status),
            "illegal transition {:?} -> {:?}",
            self.status,
            update.status
        );
        self.status = update.status;
        updates.push(update);
    }
}

/// Active subscriptions keyed by (network id, hash)
type ActiveMap = Mutex<HashMap<(String, String), TrackingHandle>>;

struct HandleState {
    cancelled: AtomicBool,
    done: watch::Sender<bool>,
    abort: Mutex<Option<AbortHandle>>,
}

/// Handle to a running tracking subscription
#[derive(Clone)]
pub struct TrackingHandle {
    hash: String,
    network_id: String,
    state: Arc<HandleState>,
    registry: Weak<ActiveMap>,
}

impl std::fmt::Debug for TrackingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingHandle")
            .field("hash", &self.hash)
            .field("network_id", &self.network_id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl TrackingHandle {
    fn new(hash: &str, network_id: &str, registry: Weak<ActiveMap>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            hash: hash.to_string(),
            network_id: network_id.to_string(),
            state: Arc::new(HandleState {
                cancelled: AtomicBool::new(false),
                done,
                abort: Mutex::new(None),
            }),
            registry,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// True until the transaction reaches a terminal status or the
    /// subscription is cancelled
    pub fn is_active(&self) -> bool {
        !*self.state.done.borrow()
    }

    pub fn same_subscription(&self, other: &TrackingHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Stop polling. Results of a poll already in flight are discarded.
    pub fn unsubscribe(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut abort) = self.state.abort.lock() {
            if let Some(handle) = abort.take() {
                handle.abort();
            }
        }
        self.finish();
    }

    /// Wait until tracking stops
    pub async fn wait(&self) {
        let mut done = self.state.done.subscribe();
        let _ = done.wait_for(|finished| *finished).await;
    }

    fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    fn set_abort(&self, handle: AbortHandle) {
        if let Ok(mut abort) = self.state.abort.lock() {
            *abort = Some(handle);
        }
    }

    fn key(&self) -> (String, String) {
        (self.network_id.clone(), self.hash.clone())
    }

    fn finish(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut active) = registry.lock() {
                let key = self.key();
                if active
                    .get(&key)
                    .is_some_and(|h| h.same_subscription(self))
                {
                    active.remove(&key);
                }
            }
        }
        self.state.done.send_replace(true);
    }
}

/// Runs one polling loop per tracked transaction
#[derive(Clone)]
pub struct TransactionTracker {
    node: Arc<dyn NodeClient>,
    store: TransactionStore,
    settings: TrackingSettings,
    active: Arc<ActiveMap>,
}

impl TransactionTracker {
    pub fn new(node: Arc<dyn NodeClient>, store: TransactionStore, settings: TrackingSettings) -> Self {
        Self {
            node,
            store,
            settings,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_tracking(&self, hash: &str, network_id: &str) -> bool {
        let key = (network_id.to_string(), hash.to_string());
        self.active
            .lock()
            .map(|active| active.contains_key(&key))
            .unwrap_or(false)
    }

    /// Start polling a recorded transaction.
    ///
    /// Returns `None` when the transaction is already terminal. Tracking a
    /// transaction that is already being tracked on the same network
    /// returns the existing handle.
    pub async fn track(&self, hash: &str, network: &Network) -> Result<Option<TrackingHandle>> {
        let transaction = self
            .store
            .get(hash, &network.id)
            .await
            .ok_or_else(|| Error::TransactionNotFound(hash.to_string()))?;

        if transaction.status.is_terminal() {
            debug!(hash, status = ?transaction.status, "Transaction already settled, not tracking");
            return Ok(None);
        }

        let handle = {
            let mut active = self
                .active
                .lock()
                .map_err(|_| Error::Storage("tracking registry poisoned".to_string()))?;
            let handle = TrackingHandle::new(hash, &network.id, Arc::downgrade(&self.active));
            if let Some(existing) = active.get(&handle.key()) {
                return Ok(Some(existing.clone()));
            }
            active.insert(handle.key(), handle.clone());
            handle
        };

        info!(
            hash,
            network = %network.id,
            status = ?transaction.status,
            "Tracking transaction"
        );

        let task = tokio::spawn(self.clone().poll_until_settled(
            transaction.status,
            network.clone(),
            handle.clone(),
        ));
        handle.set_abort(task.abort_handle());

        Ok(Some(handle))
    }

    /// Resume tracking of every unfinished transaction on a known network.
    /// Returns the handles of the subscriptions started.
    pub async fn resume_pending(&self, networks: &[Network]) -> Vec<TrackingHandle> {
        let mut handles = Vec::new();
        for transaction in self.store.unfinished().await {
            let Some(network) = networks.iter().find(|n| n.id == transaction.network_id()) else {
                warn!(
                    hash = %transaction.hash,
                    network = %transaction.network_id(),
                    "Unknown network for unfinished transaction"
                );
                continue;
            };
            match self.track(&transaction.hash, network).await {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(e) => warn!(hash = %transaction.hash, error = %e, "Could not resume tracking"),
            }
        }
        handles
    }

    async fn poll_until_settled(
        self,
        initial: TransactionStatus,
        network: Network,
        handle: TrackingHandle,
    ) {
        let hash = handle.hash().to_string();
        let mut machine =
            StatusMachine::new(hash.clone(), initial, self.settings.not_found_retry_limit);
        let mut unsaved = VecDeque::new();

        loop {
            // Once terminal, only the unsaved updates remain to be written
            if !machine.is_finished() {
                let result = self.node.transaction_status(&network, &hash).await;
                if handle.is_cancelled() {
                    debug!(%hash, "Discarding poll result after unsubscribe");
                    break;
                }
                unsaved.extend(machine.on_poll(result));
            }

            self.persist(&hash, &network.id, &mut unsaved).await;

            if machine.is_finished() && unsaved.is_empty() {
                info!(%hash, status = ?machine.status(), "Transaction settled");
                break;
            }
            if machine.not_found_count() > 0 {
                debug!(%hash, attempts = machine.not_found_count(), "Transaction not found yet");
            }

            tokio::time::sleep(self.settings.polling_interval()).await;
            if handle.is_cancelled() {
                break;
            }
        }

        handle.finish();
    }

    /// Write pending updates in order, stopping at the first failure.
    /// Whatever is left is retried on the next interval.
    async fn persist(&self, hash: &str, network_id: &str, unsaved: &mut VecDeque<StatusUpdate>) {
        while let Some(update) = unsaved.front() {
            match self.store.set_status(hash, network_id, update).await {
                Ok(_) => {
                    unsaved.pop_front();
                }
                Err(e) => {
                    warn!(
                        hash,
                        status = ?update.status,
                        unsaved = unsaved.len(),
                        error = %e,
                        "Failed to persist status, will retry"
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::BaseAccount;
    use crate::node::SubmitResult;
    use crate::storage::{MemoryBackend, StorageBackend};
    use crate::transactions::model::tests::reviewed;
    use crate::transactions::model::Transaction;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn confirmed(block: &str) -> TxStatus {
        TxStatus::Confirmed {
            block_hash: block.to_string(),
            tx_index: 0,
            chain_confirmations: 1,
            from_group_confirmations: 1,
            to_group_confirmations: 1,
        }
    }

    /// Node that replays a script and then keeps reporting MemPooled
    struct ScriptedNode {
        script: Mutex<VecDeque<std::result::Result<TxStatus, NodeError>>>,
        polls: AtomicUsize,
    }

    impl ScriptedNode {
        fn new(script: Vec<std::result::Result<TxStatus, NodeError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                polls: AtomicUsize::new(0),
            })
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NodeClient for ScriptedNode {
        async fn transaction_status(
            &self,
            _network: &Network,
            _tx_id: &str,
        ) -> std::result::Result<TxStatus, NodeError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(TxStatus::MemPooled))
        }

        async fn submit_transaction(
            &self,
            _network: &Network,
            _unsigned_tx: &str,
            _signature: &str,
        ) -> std::result::Result<SubmitResult, NodeError> {
            unreachable!("tracker never submits")
        }
    }

    /// Node that holds every poll until released, then confirms
    #[derive(Default)]
    struct BlockingNode {
        release: Notify,
        polls: AtomicUsize,
    }

    #[async_trait]
    impl NodeClient for BlockingNode {
        async fn transaction_status(
            &self,
            _network: &Network,
            _tx_id: &str,
        ) -> std::result::Result<TxStatus, NodeError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(confirmed("late-block"))
        }

        async fn submit_transaction(
            &self,
            _network: &Network,
            _unsigned_tx: &str,
            _signature: &str,
        ) -> std::result::Result<SubmitResult, NodeError> {
            unreachable!("tracker never submits")
        }
    }

    /// Backend whose writes can be switched off
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        async fn read(&self, key: &str) -> Result<Option<Value>> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, value: &Value) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Storage("disk full".to_string()));
            }
            self.inner.write(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
    }

    fn network() -> Network {
        Network::new("devnet", "Devnet", "http://node.invalid", "http://explorer.invalid")
    }

    fn testnet() -> Network {
        Network::new("testnet", "Testnet", "http://testnet.invalid", "http://explorer.invalid")
    }

    async fn record(store: &TransactionStore, hash: &str, network_id: &str, status: TransactionStatus) {
        let mut transaction = Transaction::submitted(
            hash,
            BaseAccount::new("addr", network_id),
            reviewed("addr", hash),
            Utc::now(),
        );
        transaction.status = status;
        store.add(transaction).await.unwrap();
    }

    async fn setup_with(
        backend: Arc<dyn StorageBackend>,
        node: Arc<dyn NodeClient>,
        status: TransactionStatus,
    ) -> (TransactionTracker, TransactionStore) {
        let store = TransactionStore::new(backend);
        record(&store, "h1", "devnet", status).await;
        let tracker = TransactionTracker::new(node, store.clone(), TrackingSettings::default());
        (tracker, store)
    }

    async fn setup(
        node: Arc<dyn NodeClient>,
        status: TransactionStatus,
    ) -> (TransactionTracker, TransactionStore) {
        setup_with(Arc::new(MemoryBackend::new()), node, status).await
    }

    #[test]
    fn test_machine_counts_consecutive_not_found() {
        let mut machine = StatusMachine::new("h", TransactionStatus::Submitted, 3);
        let first = machine.on_poll(Ok(TxStatus::TxNotFound));
        assert_eq!(first, vec![StatusUpdate::to(TransactionStatus::NotFoundRetrying)]);
        assert!(machine.on_poll(Ok(TxStatus::TxNotFound)).is_empty());
        assert!(machine.on_poll(Ok(TxStatus::TxNotFound)).is_empty());
        assert_eq!(machine.not_found_count(), 3);

        let last = machine.on_poll(Ok(TxStatus::TxNotFound));
        assert_eq!(last[0].status, TransactionStatus::Failed);
        assert_eq!(last[0].failure.as_ref().unwrap().kind, FailureKind::NotFound);
        assert!(machine.is_finished());
        assert!(machine.on_poll(Ok(confirmed("b"))).is_empty());
    }

    #[test]
    fn test_machine_sighting_resets_counter() {
        let mut machine = StatusMachine::new("h", TransactionStatus::Submitted, 3);
        for _ in 0..3 {
            machine.on_poll(Ok(TxStatus::TxNotFound));
        }
        let seen = machine.on_poll(Ok(TxStatus::MemPooled));
        assert_eq!(seen, vec![StatusUpdate::to(TransactionStatus::Pending)]);
        assert_eq!(machine.not_found_count(), 0);

        // Pending never regresses on a not-found response
        assert!(machine.on_poll(Ok(TxStatus::TxNotFound)).is_empty());
        assert_eq!(machine.status(), TransactionStatus::Pending);
    }

    #[test]
    fn test_machine_confirms_through_pending() {
        let mut machine = StatusMachine::new("h", TransactionStatus::NotFoundRetrying, 3);
        let updates = machine.on_poll(Ok(confirmed("block")));
        let statuses: Vec<_> = updates.iter().map(|u| u.status).collect();
        assert_eq!(
            statuses,
            vec![TransactionStatus::Pending, TransactionStatus::Confirmed]
        );
        assert_eq!(updates[1].block_hash.as_deref(), Some("block"));
    }

    #[test]
    fn test_machine_node_error_fails_with_body() {
        let mut machine = StatusMachine::new("h", TransactionStatus::Pending, 3);
        let updates = machine.on_poll(Err(NodeError::Response {
            status: 500,
            body: json!({"detail": "boom"}),
        }));
        let failure = updates[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Node);
        assert!(failure.message.contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn mempooled_then_confirmed_stops_polling() {
        let node = ScriptedNode::new(vec![Ok(TxStatus::MemPooled), Ok(confirmed("block-1"))]);
        let (tracker, store) = setup(node.clone(), TransactionStatus::Submitted).await;

        let handle = tracker.track("h1", &network()).await.unwrap().unwrap();
        handle.wait().await;

        let stored = store.get("h1", "devnet").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Confirmed);
        assert_eq!(stored.block_hash.as_deref(), Some("block-1"));
        assert_eq!(node.polls(), 2);
        assert!(!tracker.is_tracking("h1", "devnet"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(node.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn four_not_found_fail_the_transaction() {
        let node = ScriptedNode::new((0..4).map(|_| Ok(TxStatus::TxNotFound)).collect());
        let (tracker, store) = setup(node.clone(), TransactionStatus::Submitted).await;

        tracker.track("h1", &network()).await.unwrap().unwrap().wait().await;

        let stored = store.get("h1", "devnet").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
        let failure = stored.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.message.contains("h1"));
        assert_eq!(node.polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn three_not_found_then_seen_keeps_going() {
        let mut script: Vec<_> = (0..3).map(|_| Ok(TxStatus::TxNotFound)).collect();
        script.push(Ok(TxStatus::MemPooled));
        script.push(Ok(confirmed("block-2")));
        let node = ScriptedNode::new(script);
        let (tracker, store) = setup(node.clone(), TransactionStatus::Submitted).await;

        tracker.track("h1", &network()).await.unwrap().unwrap().wait().await;

        let stored = store.get("h1", "devnet").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Confirmed);
        assert!(stored.failure.is_none());
        assert_eq!(node.polls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn node_error_fails_with_detail() {
        let node = ScriptedNode::new(vec![Err(NodeError::Response {
            status: 400,
            body: json!({"detail": "Malformed transaction"}),
        })]);
        let (tracker, store) = setup(node.clone(), TransactionStatus::Submitted).await;

        tracker.track("h1", &network()).await.unwrap().unwrap().wait().await;

        let stored = store.get("h1", "devnet").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
        let failure = stored.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::Node);
        assert!(failure.message.contains("Malformed transaction"));
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_stops_polling() {
        let node = ScriptedNode::new(vec![]);
        let (tracker, store) = setup(node.clone(), TransactionStatus::Submitted).await;

        let handle = tracker.track("h1", &network()).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(7_000)).await;
        handle.unsubscribe();
        let polls = node.polls();
        assert!(polls >= 2);
        assert!(!handle.is_active());
        assert!(!tracker.is_tracking("h1", "devnet"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(node.polls(), polls);
        assert_eq!(
            store.get("h1", "devnet").await.unwrap().status,
            TransactionStatus::Pending
        );
    }

    #[tokio::test(start_paused = true)]
    async fn settled_transaction_is_not_tracked() {
        let node = ScriptedNode::new(vec![]);
        let (tracker, _) = setup(node.clone(), TransactionStatus::Confirmed).await;

        assert!(tracker.track("h1", &network()).await.unwrap().is_none());
        assert_eq!(node.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_transaction_is_an_error() {
        let node = ScriptedNode::new(vec![]);
        let (tracker, _) = setup(node, TransactionStatus::Submitted).await;

        let err = tracker.track("other", &network()).await.unwrap_err();
        assert!(matches!(err, Error::TransactionNotFound(hash) if hash == "other"));
    }

    #[tokio::test(start_paused = true)]
    async fn one_subscription_per_hash() {
        let node = ScriptedNode::new(vec![]);
        let (tracker, _) = setup(node, TransactionStatus::Submitted).await;

        let first = tracker.track("h1", &network()).await.unwrap().unwrap();
        let second = tracker.track("h1", &network()).await.unwrap().unwrap();
        assert!(first.same_subscription(&second));

        first.unsubscribe();
        let third = tracker.track("h1", &network()).await.unwrap().unwrap();
        assert!(!third.same_subscription(&first));
        third.unsubscribe();
    }

    #[tokio::test(start_paused = true)]
    async fn resume_pending_tracks_unfinished_on_known_networks() {
        let node = ScriptedNode::new(vec![Ok(confirmed("block-3"))]);
        let (tracker, store) = setup(node.clone(), TransactionStatus::Pending).await;
        let orphan = Transaction::submitted(
            "h2",
            BaseAccount::new("addr", "gone"),
            reviewed("addr", "h2"),
            Utc::now(),
        );
        store.add(orphan).await.unwrap();

        let handles = tracker.resume_pending(&[network()]).await;
        assert_eq!(handles.len(), 1);
        handles[0].wait().await;

        assert_eq!(
            store.get("h1", "devnet").await.unwrap().status,
            TransactionStatus::Confirmed
        );
        assert_eq!(
            store.get("h2", "gone").await.unwrap().status,
            TransactionStatus::Submitted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn same_hash_on_two_networks_is_tracked_separately() {
        let node = ScriptedNode::new(vec![Ok(confirmed("block-a")), Ok(confirmed("block-b"))]);
        let (tracker, store) = setup(node.clone(), TransactionStatus::Submitted).await;
        record(&store, "h1", "testnet", TransactionStatus::Submitted).await;

        let devnet = tracker.track("h1", &network()).await.unwrap().unwrap();
        let other = tracker.track("h1", &testnet()).await.unwrap().unwrap();
        assert!(!devnet.same_subscription(&other));
        assert_eq!(other.network_id(), "testnet");
        assert!(tracker.is_tracking("h1", "devnet"));
        assert!(tracker.is_tracking("h1", "testnet"));

        devnet.wait().await;
        other.wait().await;

        assert_eq!(node.polls(), 2);
        for network_id in ["devnet", "testnet"] {
            assert_eq!(
                store.get("h1", network_id).await.unwrap().status,
                TransactionStatus::Confirmed
            );
            assert!(!tracker.is_tracking("h1", network_id));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unsaved_terminal_status_is_retried_before_settling() {
        let backend = Arc::new(FlakyBackend::default());
        let node = ScriptedNode::new(vec![Ok(confirmed("block-1"))]);
        let (tracker, store) =
            setup_with(backend.clone(), node.clone(), TransactionStatus::Submitted).await;
        backend.fail_writes.store(true, Ordering::SeqCst);

        let handle = tracker.track("h1", &network()).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(handle.is_active());
        assert!(tracker.is_tracking("h1", "devnet"));
        assert_eq!(
            store.get("h1", "devnet").await.unwrap().status,
            TransactionStatus::Submitted
        );

        backend.fail_writes.store(false, Ordering::SeqCst);
        handle.wait().await;

        let stored = store.get("h1", "devnet").await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Confirmed);
        assert_eq!(stored.block_hash.as_deref(), Some("block-1"));
        // the node is not asked again once the outcome is known
        assert_eq!(node.polls(), 1);
        assert!(!tracker.is_tracking("h1", "devnet"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_in_flight_at_unsubscribe_is_discarded() {
        let node = Arc::new(BlockingNode::default());
        let (tracker, store) = setup(node.clone(), TransactionStatus::Submitted).await;

        let notifications = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let notifications = notifications.clone();
            store.subscribe(move |_| {
                notifications.fetch_add(1, Ordering::SeqCst);
            })
        };

        let handle = tracker.track("h1", &network()).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(node.polls.load(Ordering::SeqCst), 1);

        handle.unsubscribe();
        node.release.notify_one();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(
            store.get("h1", "devnet").await.unwrap().status,
            TransactionStatus::Submitted
        );
        assert_eq!(notifications.load(Ordering::SeqCst), 0);
        assert_eq!(node.polls.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
        assert!(!tracker.is_tracking("h1", "devnet"));
    }
}
