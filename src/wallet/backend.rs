//! In-process signing with locally held keys

use super::{SecureWallet, SigningBackend};
use crate::accounts::WalletAccount;
use crate::network::Network;
use crate::node::{NodeClient, SubmitResult};
use crate::transactions::UnsignedTransaction;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Signs with keys held in memory and submits through a node client
pub struct LocalSigningBackend {
    node: Arc<dyn NodeClient>,
    networks: HashMap<String, Network>,
    keys: HashMap<String, SecureWallet>,
}

impl LocalSigningBackend {
    pub fn new(node: Arc<dyn NodeClient>, networks: &[Network]) -> Self {
        Self {
            node,
            networks: networks
                .iter()
                .map(|n| (n.id.clone(), n.clone()))
                .collect(),
            keys: HashMap::new(),
        }
    }

    /// Register the key that signs for `address`
    pub fn with_key(mut self, address: impl Into<String>, wallet: SecureWallet) -> Self {
        self.keys.insert(address.into(), wallet);
        self
    }

    pub fn has_key(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }
}

fn decode_tx_id(tx_id: &str) -> Result<[u8; 32]> {
    let bytes = alloy::hex::decode(tx_id)
        .map_err(|e| Error::InvalidArgument(format!("Malformed transaction id {}: {}", tx_id, e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::InvalidArgument(format!(
            "Transaction id must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}

#[async_trait]
impl SigningBackend for LocalSigningBackend {
    async fn sign_and_submit(
        &self,
        account: &WalletAccount,
        transaction: &UnsignedTransaction,
    ) -> Result<SubmitResult> {
        let wallet = self.keys.get(account.address()).ok_or_else(|| {
            Error::Wallet(format!("No signing key for account {}", account.base))
        })?;
        let network = self
            .networks
            .get(account.network_id())
            .ok_or_else(|| Error::UnknownNetwork(account.network_id().to_string()))?;

        let tx_id = decode_tx_id(&transaction.tx_id)?;
        let signature = alloy::hex::encode(wallet.sign_hash(&tx_id)?.as_bytes());
        debug!(tx_id = %transaction.tx_id, account = %account.base, "Signed transaction");

        let submitted = self
            .node
            .submit_transaction(network, &transaction.unsigned_tx, &signature)
            .await
            .map_err(|e| Error::SigningOrSubmissionFailed(e.detail()))?;

        info!(
            tx_id = %submitted.tx_id,
            network = %network.id,
            from_group = submitted.from_group,
            to_group = submitted.to_group,
            "Transaction submitted"
        );
        Ok(submitted)
    }
}
