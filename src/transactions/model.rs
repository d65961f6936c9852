//! Transaction records and their status lattice

use crate::accounts::BaseAccount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of request the user reviewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Transfer,
    DeployContract,
    ExecuteScript,
    UnsignedTx,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParams {
    pub signer_address: String,
    /// Kind-specific parameters (destinations, bytecode, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unsigned transaction built for a reviewed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub unsigned_tx: String,
    pub tx_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A request that passed user review and is ready to be signed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedTransactionRequest {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub params: TransactionParams,
    pub result: UnsignedTransaction,
}

impl ReviewedTransactionRequest {
    pub fn signer_address(&self) -> &str {
        &self.params.signer_address
    }
}

/// Lifecycle of a submitted transaction.
///
/// ```text
/// Submitted -> Pending | NotFoundRetrying | Confirmed | Failed
/// Pending -> Confirmed | Failed
/// NotFoundRetrying -> Pending | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Submitted,
    Pending,
    NotFoundRetrying,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Confirmed | TransactionStatus::Failed)
    }

    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Submitted, Pending)
                | (Submitted, NotFoundRetrying)
                | (Submitted, Confirmed)
                | (Submitted, Failed)
                | (Pending, Confirmed)
                | (Pending, Failed)
                | (NotFoundRetrying, Pending)
                | (NotFoundRetrying, Failed)
        )
    }

    pub fn summary(self) -> StatusSummary {
        match self {
            TransactionStatus::Confirmed => StatusSummary::Success,
            TransactionStatus::Failed => StatusSummary::Error,
            _ => StatusSummary::Pending,
        }
    }
}

/// Coarse status for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusSummary {
    Unknown,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Still unknown to the node after the retry budget
    NotFound,
    /// Node or transport error while polling
    Node,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub request: ReviewedTransactionRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub account: BaseAccount,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub meta: TransactionMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TransactionFailure>,
}

impl Transaction {
    /// Record for a transaction the node just accepted
    pub fn submitted(
        hash: impl Into<String>,
        account: BaseAccount,
        request: ReviewedTransactionRequest,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            hash: hash.into(),
            account,
            status: TransactionStatus::Submitted,
            timestamp,
            meta: TransactionMeta { request },
            block_hash: None,
            failure: None,
        }
    }

    pub fn network_id(&self) -> &str {
        &self.account.network_id
    }
}

pub fn transactions_equal(a: &Transaction, b: &Transaction) -> bool {
    a.hash == b.hash && a.account.network_id == b.account.network_id
}
