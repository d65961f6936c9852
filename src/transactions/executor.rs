//! Signing and recording of reviewed transactions

use super::model::{ReviewedTransactionRequest, Transaction};
use super::store::TransactionStore;
use crate::accounts::{AccountStore, BaseAccount};
use crate::clock::Clock;
use crate::wallet::SigningBackend;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct TransactionExecutor {
    accounts: AccountStore,
    transactions: TransactionStore,
    signer: Arc<dyn SigningBackend>,
    clock: Arc<dyn Clock>,
}

impl TransactionExecutor {
    pub fn new(
        accounts: AccountStore,
        transactions: TransactionStore,
        signer: Arc<dyn SigningBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            transactions,
            signer,
            clock,
        }
    }

    /// Sign and submit a reviewed request, then record it as `Submitted`.
    ///
    /// Nothing is recorded unless the node returned a transaction hash.
    pub async fn execute(
        &self,
        request: &ReviewedTransactionRequest,
        network_id: &str,
    ) -> Result<Transaction> {
        let base = BaseAccount::new(request.signer_address(), network_id);
        let account = self
            .accounts
            .find(&base)
            .await
            .ok_or_else(|| Error::AccountNotFound {
                address: base.address.clone(),
                network_id: base.network_id.clone(),
            })?;

        let submitted = self
            .signer
            .sign_and_submit(&account, &request.result)
            .await
            .map_err(|e| match e {
                Error::SigningOrSubmissionFailed(detail) => Error::SigningOrSubmissionFailed(detail),
                other => Error::SigningOrSubmissionFailed(other.to_string()),
            })?;

        if submitted.tx_id != request.result.tx_id {
            warn!(
                expected = %request.result.tx_id,
                returned = %submitted.tx_id,
                "Node returned a different transaction id"
            );
        }

        let transaction =
            Transaction::submitted(submitted.tx_id, base, request.clone(), self.clock.now());

        if let Err(e) = self.transactions.add(transaction.clone()).await {
            error!(
                hash = %transaction.hash,
                error = %e,
                "Submitted transaction could not be recorded"
            );
            return Err(e);
        }

        info!(
            hash = %transaction.hash,
            account = %transaction.account,
            kind = ?request.kind,
            "Transaction recorded"
        );
        Ok(transaction)
    }
}
