//! nanochain: a compact blockchain node
//!
//! The crate implements the core of a small, self-contained blockchain:
//! - ECDSA (P-256) keys and signatures over SHA-256 digests
//! - a UTXO ledger with atomic spend/create semantics
//! - a fee-prioritised mempool with replay protection
//! - merkle-committed blocks with hash linking
//! - a parallel proof-of-work miner with cancellation and timeout
//! - a stake-weighted proof-of-stake proposer selector
//! - difficulty retargeting and longest-valid-chain reorganisation
//! - TCP gossip of blocks, transactions and chain snapshots
//!
//! # Example
//!
//! ```rust
//! use nanochain::core::Blockchain;
//!
//! let chain = Blockchain::new();
//! chain.set_miner_address("miner");
//!
//! let block = chain.append_pow(vec![]).unwrap();
//! assert_eq!(chain.height(), 1);
//! assert!(block.hash.starts_with('0'));
//! ```

pub mod api;
pub mod cli;
pub mod contract;
pub mod core;
pub mod crypto;
pub mod did;
pub mod mining;
pub mod network;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use contract::{ContractEngine, Value};
pub use core::{Block, Blockchain, Consensus, Transaction, BLOCK_REWARD};
pub use crypto::KeyPair;
pub use did::DidRegistry;
pub use mining::{Mempool, ProofOfWork};
pub use network::{Message, Node};
pub use wallet::Wallet;
