//! Block record and hashing
//!
//! A block commits to its transaction list through a merkle root and links
//! to its predecessor by hash. The stored hash always matches
//! `calculate_hash()`; the nonce search fills in `nonce` and `hash` after
//! the engine has assigned the final index.

use crate::core::transaction::Transaction;
use crate::crypto::{merkle_root, sha256_hex};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Position of the block in the chain
    pub index: u64,
    /// Creation time, seconds since epoch
    pub timestamp: i64,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Merkle root of the transaction hashes
    pub merkle_root: String,
    /// Proof-of-work search variable (zero under proof of stake)
    pub nonce: u64,
    /// Number of leading '0' hex characters required of the hash
    pub difficulty: u32,
    /// Hash of the block contents
    pub hash: String,
    /// Transactions included in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block. The index starts at zero; the chain engine
    /// assigns the real position before the block is sealed.
    pub fn new(transactions: Vec<Transaction>, previous_hash: &str, difficulty: u32) -> Self {
        let merkle = merkle_root(&tx_hashes(&transactions));
        let mut block = Self {
            index: 0,
            timestamp: Utc::now().timestamp(),
            previous_hash: previous_hash.to_string(),
            merkle_root: merkle,
            nonce: 0,
            difficulty,
            hash: String::new(),
            transactions,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// The fixed genesis block: index 0, previous hash "0", no
    /// transactions, difficulty 1, nonce 0.
    pub fn genesis() -> Self {
        Self::new(Vec::new(), "0", 1)
    }

    /// Recompute the block hash from its contents. The merkle root is
    /// rederived from the transaction list so tampering with either the
    /// transactions or the header is detectable.
    pub fn calculate_hash(&self) -> String {
        self.hash_with_nonce(self.nonce)
    }

    /// Block digest for an arbitrary nonce, used by the nonce search
    pub fn hash_with_nonce(&self, nonce: u64) -> String {
        let record = format!(
            "{}{}{}{}{}{}",
            self.index,
            self.timestamp,
            self.previous_hash,
            merkle_root(&tx_hashes(&self.transactions)),
            nonce,
            self.difficulty
        );
        sha256_hex(record.as_bytes())
    }

    /// Total serialized size of the block's transactions in bytes
    pub fn size(&self) -> usize {
        self.transactions.iter().map(|tx| tx.size()).sum()
    }
}

fn tx_hashes(transactions: &[Transaction]) -> Vec<String> {
    transactions.iter().map(|tx| tx.hash()).collect()
}
