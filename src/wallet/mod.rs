//! Signing and submission
//!
//! Private keys never leave this module. The executor only sees the
//! [`SigningBackend`] trait and the transaction id it returns.

mod backend;
mod signer;

pub use backend::LocalSigningBackend;
pub use signer::SecureWallet;

use crate::accounts::WalletAccount;
use crate::node::SubmitResult;
use crate::transactions::UnsignedTransaction;
use crate::Result;
use async_trait::async_trait;

/// Signs an unsigned transaction for an account and submits it to the
/// account's network
#[async_trait]
pub trait SigningBackend: Send + Sync {
    async fn sign_and_submit(
        &self,
        account: &WalletAccount,
        transaction: &UnsignedTransaction,
    ) -> Result<SubmitResult>;
}
