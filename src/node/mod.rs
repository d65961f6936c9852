//! Node and explorer access
//!
//! The core only needs three things from a node: its version (health),
//! the status of a transaction, and a way to submit a signed transaction.

mod http;

pub use http::HttpNodeClient;

use crate::network::Network;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for node and explorer calls
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Node responded with status {status}: {body}")]
    Response { status: u16, body: Value },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl NodeError {
    /// Detail suitable for persisting, preferring the node's structured
    /// response body over the error message
    pub fn detail(&self) -> String {
        match self {
            NodeError::Response { body, .. } => {
                serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
            }
            other => other.to_string(),
        }
    }
}

/// Transaction status as reported by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TxStatus {
    #[serde(rename_all = "camelCase")]
    Confirmed {
        block_hash: String,
        #[serde(default)]
        tx_index: u32,
        #[serde(default)]
        chain_confirmations: u32,
        #[serde(default)]
        from_group_confirmations: u32,
        #[serde(default)]
        to_group_confirmations: u32,
    },
    MemPooled,
    TxNotFound,
}

/// Result of submitting a signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    pub tx_id: String,
    #[serde(default)]
    pub from_group: u32,
    #[serde(default)]
    pub to_group: u32,
}

#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn transaction_status(&self, network: &Network, tx_id: &str)
        -> Result<TxStatus, NodeError>;

    async fn submit_transaction(
        &self,
        network: &Network,
        unsigned_tx: &str,
        signature: &str,
    ) -> Result<SubmitResult, NodeError>;
}
