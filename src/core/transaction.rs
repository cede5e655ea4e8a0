//! Transaction handling
//!
//! Transactions carry an explicit sender/recipient pair, a fee, and a
//! per-sender nonce for replay protection. The transaction hash covers
//! everything except the timestamp and the signature, so a hash is stable
//! from creation through signing.

use crate::core::account::Accounts;
use crate::core::utxo::{Utxo, UtxoSet};
use crate::crypto::{sha256_hex, verify_signature, KeyPair, SignatureParts};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sender address used by reward and genesis-seed transactions
pub const SYSTEM_SENDER: &str = "system";

/// Transaction validation errors, reported verbatim to the submitter
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Sender account does not exist")]
    SenderUnknown,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Insufficient UTXOs")]
    InsufficientUtxos,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Nonce must be greater than the account nonce")]
    BadNonce,
    #[error("Fee below the required minimum")]
    FeeTooLow,
    #[error("Crypto error: {0}")]
    Crypto(String),
}

/// A blockchain transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender address
    pub sender: String,
    /// Recipient address
    pub recipient: String,
    /// Amount transferred
    pub amount: u64,
    /// Fee paid to the miner
    pub fee: u64,
    /// Per-sender replay counter, strictly increasing
    pub nonce: u64,
    /// Creation time, seconds since epoch
    pub timestamp: i64,
    /// ECDSA signature over the transaction hash
    pub signature: Option<SignatureParts>,
}

impl Transaction {
    /// Create an unsigned transaction stamped with the current time
    pub fn new(sender: &str, recipient: &str, amount: u64, fee: u64, nonce: u64) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            fee,
            nonce,
            timestamp: Utc::now().timestamp(),
            signature: None,
        }
    }

    /// Create a system-issued reward transaction. The block height doubles
    /// as the nonce so reward hashes stay unique per block.
    pub fn reward(recipient: &str, amount: u64, height: u64) -> Self {
        Self::new(SYSTEM_SENDER, recipient, amount, 0, height)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// Deterministic transaction hash over
    /// sender ‖ recipient ‖ amount ‖ fee ‖ nonce.
    pub fn hash(&self) -> String {
        let record = format!(
            "{}{}{}{}{}",
            self.sender, self.recipient, self.amount, self.fee, self.nonce
        );
        sha256_hex(record.as_bytes())
    }

    /// Sign the transaction hash with the sender's key
    pub fn sign(&mut self, keys: &KeyPair) -> Result<(), TransactionError> {
        let sig = keys
            .sign(self.hash().as_bytes())
            .map_err(|e| TransactionError::Crypto(e.to_string()))?;
        self.signature = Some(sig);
        Ok(())
    }

    /// Check the signature against a hex-encoded public key
    pub fn verify(&self, public_key_hex: &str) -> bool {
        match &self.signature {
            Some(sig) => verify_signature(public_key_hex, self.hash().as_bytes(), sig),
            None => false,
        }
    }

    /// Size of the serialized transaction in bytes
    pub fn size(&self) -> usize {
        serde_json::to_vec(self).map(|d| d.len()).unwrap_or(0)
    }

    /// Validate against the ledger and, on success, apply the transfer:
    /// spend the sender's selected outputs, create the recipient output
    /// (and a change output when needed), and move the account balances.
    /// Nothing is mutated on failure.
    pub fn validate(&self, accounts: &Accounts, utxos: &UtxoSet) -> Result<(), TransactionError> {
        let sender = accounts
            .get(&self.sender)
            .ok_or(TransactionError::SenderUnknown)?;

        let needed = self.amount + self.fee;
        if sender.balance < needed {
            return Err(TransactionError::InsufficientBalance);
        }

        let (selected, total) = utxos.find(&self.sender, needed);
        if total < needed {
            return Err(TransactionError::InsufficientUtxos);
        }

        utxos.spend(&selected);

        let tx_id = self.hash();
        utxos.add(Utxo {
            tx_id: tx_id.clone(),
            index: 0,
            amount: self.amount,
            owner: self.recipient.clone(),
        });
        if total > needed {
            utxos.add(Utxo {
                tx_id,
                index: 1,
                amount: total - needed,
                owner: self.sender.clone(),
            });
        }

        let nonce = self.nonce;
        accounts.update(&self.sender, |a| {
            a.debit(needed);
            a.nonce = nonce;
        });
        accounts.update(&self.recipient, |a| a.credit(self.amount));

        Ok(())
    }

    /// Credit the transaction fee to the miner as a third output
    pub fn distribute_fee(&self, utxos: &UtxoSet, miner: &str) {
        if self.fee == 0 {
            return;
        }
        utxos.add(Utxo {
            tx_id: self.hash(),
            index: 2,
            amount: self.fee,
            owner: miner.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::Account;

    fn funded_ledger(owner: &str, keys: &KeyPair, amounts: &[u64]) -> (Accounts, UtxoSet) {
        let accounts = Accounts::new();
        accounts.register(Account::new(
            owner,
            amounts.iter().sum(),
            &keys.public_key_hex(),
        ));
        let utxos = UtxoSet::new();
        for (i, amount) in amounts.iter().enumerate() {
            utxos.add(Utxo {
                tx_id: format!("seed-{i}"),
                index: 0,
                amount: *amount,
                owner: owner.to_string(),
            });
        }
        (accounts, utxos)
    }

    #[test]
    fn test_hash_ignores_timestamp_and_signature() {
        let mut tx1 = Transaction::new("alice", "bob", 10, 1, 1);
        let tx2 = Transaction {
            timestamp: tx1.timestamp + 100,
            ..tx1.clone()
        };
        assert_eq!(tx1.hash(), tx2.hash());

        let before = tx1.hash();
        let keys = KeyPair::generate().unwrap();
        tx1.sign(&keys).unwrap();
        assert_eq!(tx1.hash(), before);
    }

    #[test]
    fn test_hash_covers_nonce() {
        let tx1 = Transaction::new("alice", "bob", 10, 1, 1);
        let tx2 = Transaction::new("alice", "bob", 10, 1, 2);
        assert_ne!(tx1.hash(), tx2.hash());
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyPair::generate().unwrap();
        let mut tx = Transaction::new("alice", "bob", 10, 1, 1);

        assert!(!tx.verify(&keys.public_key_hex()));
        tx.sign(&keys).unwrap();
        assert!(tx.verify(&keys.public_key_hex()));

        let other = KeyPair::generate().unwrap();
        assert!(!tx.verify(&other.public_key_hex()));
    }

    #[test]
    fn test_validate_transfers_and_makes_change() {
        let keys = KeyPair::generate().unwrap();
        let (accounts, utxos) = funded_ledger("alice", &keys, &[100]);

        let tx = Transaction::new("alice", "bob", 30, 1, 1);
        tx.validate(&accounts, &utxos).unwrap();

        assert_eq!(utxos.balance("bob"), 30);
        assert_eq!(utxos.balance("alice"), 69);
        assert_eq!(accounts.balance("alice"), 69);
        assert_eq!(accounts.nonce("alice"), 1);
    }

    #[test]
    fn test_validate_exact_spend_leaves_no_change() {
        let keys = KeyPair::generate().unwrap();
        let (accounts, utxos) = funded_ledger("alice", &keys, &[31]);

        let tx = Transaction::new("alice", "bob", 30, 1, 1);
        tx.validate(&accounts, &utxos).unwrap();

        assert_eq!(utxos.balance("alice"), 0);
        assert_eq!(utxos.balance("bob"), 30);
    }

    #[test]
    fn test_validate_unknown_sender() {
        let accounts = Accounts::new();
        let utxos = UtxoSet::new();
        let tx = Transaction::new("ghost", "bob", 10, 1, 1);
        assert_eq!(
            tx.validate(&accounts, &utxos),
            Err(TransactionError::SenderUnknown)
        );
    }

    #[test]
    fn test_validate_insufficient_balance() {
        let keys = KeyPair::generate().unwrap();
        let (accounts, utxos) = funded_ledger("alice", &keys, &[20]);

        let tx = Transaction::new("alice", "bob", 30, 1, 1);
        assert_eq!(
            tx.validate(&accounts, &utxos),
            Err(TransactionError::InsufficientBalance)
        );
        // Nothing was spent
        assert_eq!(utxos.balance("alice"), 20);
    }

    #[test]
    fn test_validate_insufficient_utxos() {
        let keys = KeyPair::generate().unwrap();
        let accounts = Accounts::new();
        accounts.register(Account::new("alice", 100, &keys.public_key_hex()));
        let utxos = UtxoSet::new();
        utxos.add(Utxo {
            tx_id: "seed".to_string(),
            index: 0,
            amount: 10,
            owner: "alice".to_string(),
        });

        let tx = Transaction::new("alice", "bob", 30, 1, 1);
        assert_eq!(
            tx.validate(&accounts, &utxos),
            Err(TransactionError::InsufficientUtxos)
        );
        assert_eq!(utxos.balance("alice"), 10);
    }

    #[test]
    fn test_distribute_fee() {
        let utxos = UtxoSet::new();
        let tx = Transaction::new("alice", "bob", 30, 5, 1);
        tx.distribute_fee(&utxos, "miner");
        assert_eq!(utxos.balance("miner"), 5);

        let free = Transaction::reward("miner", 50, 1);
        free.distribute_fee(&utxos, "miner");
        assert_eq!(utxos.balance("miner"), 5);
    }

    #[test]
    fn test_reward_hash_unique_per_height() {
        let r1 = Transaction::reward("miner", 50, 1);
        let r2 = Transaction::reward("miner", 50, 2);
        assert_ne!(r1.hash(), r2.hash());
        assert!(r1.is_reward());
    }

    #[test]
    fn test_size_is_positive() {
        let tx = Transaction::new("alice", "bob", 10, 1, 1);
        assert!(tx.size() > 0);
    }
}
