//! Transaction pool for pending transactions
//!
//! Keyed by transaction hash for uniqueness. Admission runs the full
//! validation pipeline so a transaction in the pool has already passed
//! signature, nonce, fee and ledger checks; rejections surface to the
//! submitter unchanged.

use crate::core::account::Accounts;
use crate::core::blockchain::MIN_TRANSACTION_FEE;
use crate::core::transaction::{Transaction, TransactionError};
use crate::core::utxo::UtxoSet;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Mempool admission errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Transaction already exists in the mempool")]
    DuplicateTransaction,
    #[error(transparent)]
    Invalid(#[from] TransactionError),
}

/// Pool of validated but unconfirmed transactions
#[derive(Debug, Default)]
pub struct Mempool {
    transactions: RwLock<HashMap<String, Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and admit a transaction.
    ///
    /// The cheap structural checks (duplicate, fee floor, signature, nonce)
    /// run before `Transaction::validate` so the ledger is only mutated for
    /// transactions that will actually be admitted.
    pub fn add(
        &self,
        tx: Transaction,
        accounts: &Accounts,
        utxos: &UtxoSet,
    ) -> Result<(), MempoolError> {
        let tx_id = tx.hash();

        let mut pool = self.transactions.write().unwrap();
        if pool.contains_key(&tx_id) {
            return Err(MempoolError::DuplicateTransaction);
        }

        if tx.fee < MIN_TRANSACTION_FEE {
            return Err(TransactionError::FeeTooLow.into());
        }

        let sender = accounts
            .get(&tx.sender)
            .ok_or(TransactionError::SenderUnknown)?;
        if !tx.verify(&sender.public_key) {
            return Err(TransactionError::InvalidSignature.into());
        }
        if tx.nonce <= sender.nonce {
            return Err(TransactionError::BadNonce.into());
        }

        tx.validate(accounts, utxos)?;

        pool.insert(tx_id, tx);
        Ok(())
    }

    /// Remove a transaction by its hash
    pub fn remove(&self, tx: &Transaction) {
        self.transactions.write().unwrap().remove(&tx.hash());
    }

    /// Look up a transaction by hash
    pub fn get(&self, tx_id: &str) -> Option<Transaction> {
        self.transactions.read().unwrap().get(tx_id).cloned()
    }

    /// All pooled transactions, highest fee first
    pub fn get_all(&self) -> Vec<Transaction> {
        let pool = self.transactions.read().unwrap();
        let mut txs: Vec<Transaction> = pool.values().cloned().collect();
        txs.sort_by(|a, b| b.fee.cmp(&a.fee));
        txs
    }

    /// Drop transactions strictly older than `max_age`
    pub fn purge_older_than(&self, max_age: Duration) {
        let now = Utc::now().timestamp();
        let cutoff = max_age.as_secs() as i64;
        self.transactions
            .write()
            .unwrap()
            .retain(|_, tx| now - tx.timestamp <= cutoff);
    }

    pub fn clear(&self) {
        self.transactions.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.transactions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().unwrap().is_empty()
    }
}
