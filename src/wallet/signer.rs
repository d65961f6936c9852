//! Local secret key signer
//!
//! SECURITY: This is the ONLY place where private keys exist.
//! - Keys are held in alloy's PrivateKeySigner
//! - Keys are never serialized or logged

use crate::{Error, Result};
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use secrecy::{ExposeSecret, SecretString};

/// Signing key that never exposes its secret
pub struct SecureWallet {
    signer: PrivateKeySigner,
    address: Address,
}

impl SecureWallet {
    /// Create a wallet from an environment variable holding a hex key
    pub fn from_env(var_name: &str) -> Result<Self> {
        let key = std::env::var(var_name).map_err(|_| {
            Error::Wallet(format!(
                "Environment variable {} not set. Required for local signing.",
                var_name
            ))
        })?;

        Self::from_secret(&SecretString::from(key))
    }

    pub fn from_secret(key: &SecretString) -> Result<Self> {
        Self::from_hex(key.expose_secret())
    }

    /// Create a wallet from a hex-encoded private key
    pub fn from_hex(key_hex: &str) -> Result<Self> {
        let key_hex = key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| Error::Wallet(format!("Invalid private key: {}", e)))?;

        Ok(Self {
            address: signer.address(),
            signer,
        })
    }

    /// Address derived from the key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Compressed SEC1 public key, hex encoded
    pub fn public_key_hex(&self) -> String {
        let point = self.signer.credential().verifying_key().to_encoded_point(true);
        alloy::hex::encode(point.as_bytes())
    }

    /// Sign a 32-byte transaction id
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<Signature> {
        self.signer
            .sign_hash_sync(&B256::from(*hash))
            .map_err(|e| Error::Wallet(format!("Signing failed: {}", e)))
    }
}

impl std::fmt::Debug for SecureWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureWallet")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key, never funded
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_secret() {
        let wallet = SecureWallet::from_secret(&SecretString::from(TEST_KEY.to_string())).unwrap();
        assert_eq!(
            format!("{:?}", wallet.address()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_public_key_is_compressed() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();
        let public_key = wallet.public_key_hex();
        assert_eq!(public_key.len(), 66);
        assert!(public_key.starts_with("02") || public_key.starts_with("03"));
    }

    #[test]
    fn test_invalid_key_is_wallet_error() {
        assert!(matches!(
            SecureWallet::from_hex("not-a-key"),
            Err(Error::Wallet(_))
        ));
    }

    #[test]
    fn test_signature_recovers_signer() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();
        let hash = [7u8; 32];
        let signature = wallet.sign_hash(&hash).unwrap();
        let recovered = signature
            .recover_address_from_prehash(&B256::from(hash))
            .unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn test_debug_redacts_key() {
        let wallet = SecureWallet::from_hex(TEST_KEY).unwrap();
        let debug_str = format!("{:?}", wallet);
        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
