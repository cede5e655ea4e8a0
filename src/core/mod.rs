//! Core chain types: accounts, transactions, the UTXO ledger, blocks and
//! the chain engine

pub mod account;
pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod utxo;

pub use account::{Account, Accounts};
pub use block::Block;
pub use blockchain::{
    Blockchain, ChainError, Consensus, ADJUSTMENT_INTERVAL, BLOCK_REWARD, MAX_BLOCK_SIZE,
    MIN_TRANSACTION_FEE,
};
pub use transaction::{Transaction, TransactionError, SYSTEM_SENDER};
pub use utxo::{Utxo, UtxoSet};
