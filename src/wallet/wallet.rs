//! Wallet: a key pair with an address and PEM persistence
//!
//! The address is the hex-encoded SEC1 public key. Private keys are stored
//! as `EC PRIVATE KEY` PEM files, readable only by the owner on Unix.

use crate::core::transaction::{Transaction, TransactionError};
use crate::crypto::{CryptoError, KeyPair};
use p256::pkcs8::LineEnding;
use p256::SecretKey;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Wallet errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode PEM private key")]
    InvalidPem,
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// A user wallet
pub struct Wallet {
    keys: KeyPair,
    /// Address derived from the public key
    pub address: String,
}

impl Wallet {
    /// Create a wallet with a fresh key pair
    pub fn new() -> Result<Self, WalletError> {
        let keys = KeyPair::generate()?;
        let address = keys.public_key_hex();
        Ok(Self { keys, address })
    }

    pub fn from_keys(keys: KeyPair) -> Self {
        let address = keys.public_key_hex();
        Self { keys, address }
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// Build and sign a transfer from this wallet
    pub fn create_transaction(
        &self,
        recipient: &str,
        amount: u64,
        fee: u64,
        nonce: u64,
    ) -> Result<Transaction, WalletError> {
        let mut tx = Transaction::new(&self.address, recipient, amount, fee, nonce);
        tx.sign(&self.keys)?;
        Ok(tx)
    }

    /// Write the private key as SEC1 PEM. The file is created with
    /// owner-only permissions; a chmod after the fact would leave a
    /// window where the key is readable with the default mode.
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let pem = self
            .keys
            .secret_key()
            .to_sec1_pem(LineEnding::LF)
            .map_err(|_| WalletError::InvalidPem)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(pem.as_bytes())?;
        Ok(())
    }

    /// Load a wallet from a SEC1 PEM file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let pem = fs::read_to_string(path)?;
        let secret = SecretKey::from_sec1_pem(&pem).map_err(|_| WalletError::InvalidPem)?;
        Ok(Self::from_keys(KeyPair::from_secret_key(secret)))
    }
}
