//! Transaction execution and status tracking

mod executor;
mod model;
mod store;
mod tracker;

pub use executor::TransactionExecutor;
pub use model::{
    FailureKind, ReviewedTransactionRequest, StatusSummary, Transaction, TransactionFailure,
    TransactionKind, TransactionMeta, TransactionParams, TransactionStatus, UnsignedTransaction,
};
pub use store::{StatusUpdate, TransactionStore, TRANSACTIONS_NAMESPACE};
pub use tracker::{StatusMachine, TrackingHandle, TransactionTracker};

#[cfg(test)]
pub(crate) use model::tests::reviewed;
