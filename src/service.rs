//! Background service
//!
//! Owns every store and worker of the trust boundary and is the single
//! entry point for requests coming from connected sites.

use crate::accounts::{AccountStore, BaseAccount};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, PRIVATE_KEY_ENV};
use crate::network::{HealthProbe, NetworkHealthCache, NetworkStatus};
use crate::node::{HttpNodeClient, NodeClient};
use crate::preauth::{PreAuthorizationRegistry, RequestOptions};
use crate::storage::{FileBackend, StorageBackend};
use crate::transactions::{
    ReviewedTransactionRequest, StatusSummary, TrackingHandle, Transaction, TransactionExecutor,
    TransactionStore, TransactionTracker,
};
use crate::wallet::{LocalSigningBackend, SecureWallet, SigningBackend};
use crate::{Error, Result};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// External collaborators the service is built from
#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn StorageBackend>,
    pub node: Arc<dyn NodeClient>,
    pub probe: Arc<dyn HealthProbe>,
    pub signer: Arc<dyn SigningBackend>,
    pub clock: Arc<dyn Clock>,
}

pub struct BackgroundService {
    config: Config,
    accounts: AccountStore,
    registry: PreAuthorizationRegistry,
    health: NetworkHealthCache,
    transactions: TransactionStore,
    executor: TransactionExecutor,
    tracker: TransactionTracker,
}

impl BackgroundService {
    pub fn new(config: Config, deps: Collaborators) -> Self {
        let accounts = AccountStore::new(deps.backend.clone());
        let registry = PreAuthorizationRegistry::new(deps.backend.clone(), accounts.clone());
        let health = NetworkHealthCache::new(
            deps.probe,
            deps.backend.clone(),
            config.cache,
            deps.clock.clone(),
        );
        let transactions = TransactionStore::new(deps.backend);
        let executor = TransactionExecutor::new(
            accounts.clone(),
            transactions.clone(),
            deps.signer,
            deps.clock,
        );
        let tracker =
            TransactionTracker::new(deps.node, transactions.clone(), config.tracking);

        Self {
            config,
            accounts,
            registry,
            health,
            transactions,
            executor,
            tracker,
        }
    }

    /// Build a service backed by files under `config.storage.data_dir`,
    /// talking HTTP to the configured nodes. A signing key is loaded from
    /// the environment when present.
    pub async fn open(config: Config) -> Result<Self> {
        let backend = Arc::new(FileBackend::open(&config.storage.data_dir).await?);
        let http = Arc::new(
            HttpNodeClient::new(config.probe_timeout())
                .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?,
        );

        let mut signer = LocalSigningBackend::new(http.clone(), &config.networks);
        match std::env::var(PRIVATE_KEY_ENV) {
            Ok(key) => {
                let wallet = SecureWallet::from_secret(&SecretString::from(key))?;
                info!(address = %wallet.address(), "Loaded signing key from {}", PRIVATE_KEY_ENV);
                signer = signer.with_key(wallet.address().to_string(), wallet);
            }
            Err(_) => debug!("No {} set, signing disabled", PRIVATE_KEY_ENV),
        }

        Ok(Self::new(
            config,
            Collaborators {
                backend,
                node: http.clone(),
                probe: http,
                signer: Arc::new(signer),
                clock: Arc::new(SystemClock),
            },
        ))
    }

    /// Run the legacy authorization migration and resume tracking of
    /// unfinished transactions. A failed migration is logged and retried
    /// on the next start; tracking resumes regardless.
    pub async fn start(&self) -> Result<Vec<TrackingHandle>> {
        if let Err(e) = self.registry.migrate_legacy().await {
            error!(error = %e, "Legacy pre-authorization migration failed");
        }

        let handles = self.tracker.resume_pending(&self.config.networks).await;
        info!(resumed = handles.len(), "Background service started");
        Ok(handles)
    }

    /// Execute a reviewed request on behalf of `host`.
    ///
    /// Authorization is checked against the current registry before
    /// anything is signed or sent.
    pub async fn execute_transaction(
        &self,
        host: &str,
        request: &ReviewedTransactionRequest,
        network_id: &str,
    ) -> Result<Transaction> {
        let account = BaseAccount::new(request.signer_address(), network_id);
        if !self
            .registry
            .is_authorized(&RequestOptions::for_account(host, &account))
            .await
        {
            warn!(%host, %account, "Rejected transaction from unauthorized host");
            return Err(Error::Unauthorized {
                host: host.to_string(),
            });
        }

        let network = self.config.network(network_id)?.clone();
        let transaction = self.executor.execute(request, network_id).await?;

        if let Err(e) = self.tracker.track(&transaction.hash, &network).await {
            warn!(hash = %transaction.hash, error = %e, "Could not start tracking");
        }
        Ok(transaction)
    }

    /// Presentation status of a recorded transaction
    pub async fn transaction_status(&self, hash: &str, network_id: &str) -> StatusSummary {
        self.transactions.status_summary(hash, network_id).await
    }

    /// Health of every configured network
    pub async fn network_statuses(&self) -> HashMap<String, NetworkStatus> {
        self.health.get_network_statuses(&self.config.networks).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn registry(&self) -> &PreAuthorizationRegistry {
        &self.registry
    }

    pub fn health(&self) -> &NetworkHealthCache {
        &self.health
    }

    pub fn transactions(&self) -> &TransactionStore {
        &self.transactions
    }

    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }
}
