//! Mining: the transaction pool and the proof-of-work nonce search

pub mod mempool;
pub mod pow;

pub use mempool::{Mempool, MempoolError};
pub use pow::{PowError, ProofOfWork, DEFAULT_POW_BUDGET};
