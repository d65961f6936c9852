//! Error types for the wallet background service

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Host {host} is not authorized for this request")]
    Unauthorized { host: String },

    #[error("No account {address} on network {network_id}")]
    AccountNotFound { address: String, network_id: String },

    #[error("Signing or submission failed: {0}")]
    SigningOrSubmissionFailed(String),

    #[error("Transaction {0} not found")]
    TransactionNotFound(String),

    #[error("Network {0} is unhealthy")]
    NetworkUnhealthy(String),

    #[error("Stored value under {key} is corrupt: {reason}")]
    StorageReadCorrupt { key: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
