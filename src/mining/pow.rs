//! Proof-of-work nonce search
//!
//! Fans the search out across one worker per available core. A bounded
//! channel feeds candidate nonces from a randomly seeded producer; the
//! first worker to find a qualifying hash records the result under a mutex
//! and raises a cancellation flag. The whole search runs under a
//! wall-clock budget.

use crate::core::block::Block;
use crate::crypto::meets_difficulty;
use crate::crypto::sha256_hex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default wall-clock budget for a single search
pub const DEFAULT_POW_BUDGET: Duration = Duration::from_secs(5 * 60);

/// Proof-of-work errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PowError {
    #[error("Proof of work failed: timeout reached")]
    Timeout,
}

/// A nonce search over a candidate block
pub struct ProofOfWork {
    block: Block,
    budget: Duration,
}

impl ProofOfWork {
    /// Search with the default five-minute budget
    pub fn new(block: &Block) -> Self {
        Self::with_budget(block, DEFAULT_POW_BUDGET)
    }

    pub fn with_budget(block: &Block, budget: Duration) -> Self {
        Self {
            block: block.clone(),
            budget,
        }
    }

    /// Run the search. Returns the winning `(nonce, hash)` pair, or
    /// `PowError::Timeout` once the budget elapses with no success.
    ///
    /// When several workers find solutions concurrently exactly one result
    /// is recorded; which one is unspecified.
    pub fn run(&self) -> Result<(u64, String), PowError> {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let difficulty = self.block.difficulty;

        // The merkle root and header fields are fixed for the whole
        // search, so the record prefix is computed once.
        let tx_hashes: Vec<String> = self.block.transactions.iter().map(|tx| tx.hash()).collect();
        let prefix = format!(
            "{}{}{}{}",
            self.block.index,
            self.block.timestamp,
            self.block.previous_hash,
            crate::crypto::merkle_root(&tx_hashes)
        );

        let (sender, receiver) = mpsc::sync_channel::<u64>(workers * 2);
        let receiver = Arc::new(Mutex::new(receiver));
        let found = AtomicBool::new(false);
        let result: Mutex<Option<(u64, String)>> = Mutex::new(None);

        thread::scope(|s| {
            for _ in 0..workers {
                let receiver = Arc::clone(&receiver);
                let prefix = &prefix;
                let found = &found;
                let result = &result;
                s.spawn(move || loop {
                    let candidate = {
                        let rx = receiver.lock().unwrap();
                        rx.recv()
                    };
                    let Ok(nonce) = candidate else { break };
                    if found.load(Ordering::Acquire) {
                        break;
                    }

                    let digest =
                        sha256_hex(format!("{prefix}{nonce}{difficulty}").as_bytes());
                    if meets_difficulty(&digest, difficulty) {
                        let mut slot = result.lock().unwrap();
                        if slot.is_none() {
                            *slot = Some((nonce, digest));
                            found.store(true, Ordering::Release);
                        }
                        break;
                    }
                });
            }
            drop(receiver);

            // Producer runs on the calling thread; candidates advance from
            // a random start so concurrent miners do not collide.
            let deadline = Instant::now() + self.budget;
            let mut nonce: u64 = rand::thread_rng().gen_range(0..1_000_000_000);
            loop {
                if found.load(Ordering::Acquire) || Instant::now() >= deadline {
                    break;
                }
                match sender.try_send(nonce) {
                    Ok(()) => nonce = nonce.wrapping_add(1),
                    Err(TrySendError::Full(_)) => thread::yield_now(),
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            drop(sender);
        });

        result
            .into_inner()
            .unwrap()
            .ok_or(PowError::Timeout)
    }

    /// Recompute the digest with the block's stored nonce and check the
    /// difficulty prefix
    pub fn validate(block: &Block) -> bool {
        meets_difficulty(&block.calculate_hash(), block.difficulty)
    }
}
