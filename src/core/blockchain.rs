//! The chain engine
//!
//! Owns the block sequence, the consensus parameters and the stake table
//! behind a single reader/writer lock, alongside the account map, the UTXO
//! ledger and the mempool (each synchronised on its own). Appends are
//! serialised by the writer lock; an appended block is visible to every
//! subsequent reader before the call returns.

use crate::core::account::Accounts;
use crate::core::block::Block;
use crate::core::transaction::Transaction;
use crate::core::utxo::{Utxo, UtxoSet};
use crate::mining::mempool::{Mempool, MempoolError};
use crate::mining::pow::{PowError, ProofOfWork, DEFAULT_POW_BUDGET};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Reward paid to the miner or proposer of each block
pub const BLOCK_REWARD: u64 = 50;
/// Number of blocks between difficulty retargets
pub const ADJUSTMENT_INTERVAL: usize = 10;
/// Maximum block size in bytes
pub const MAX_BLOCK_SIZE: usize = 1_000_000;
/// Minimum fee for a transaction to be admitted
pub const MIN_TRANSACTION_FEE: u64 = 1;
/// Target seconds per block, used by the retarget window
pub const TARGET_BLOCK_SECS: i64 = 10 * 60;

/// Consensus algorithm in effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consensus {
    ProofOfWork,
    ProofOfStake,
}

impl FromStr for Consensus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pow" | "proofofwork" => Ok(Consensus::ProofOfWork),
            "pos" | "proofofstake" => Ok(Consensus::ProofOfStake),
            other => Err(format!("unknown consensus algorithm: {other}")),
        }
    }
}

impl std::fmt::Display for Consensus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Consensus::ProofOfWork => write!(f, "PoW"),
            Consensus::ProofOfStake => write!(f, "PoS"),
        }
    }
}

/// Chain engine errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Pow(#[from] PowError),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
}

/// State guarded by the engine's writer lock
#[derive(Debug)]
struct ChainInner {
    blocks: Vec<Block>,
    stake: HashMap<String, u64>,
    block_reward: u64,
    protocol_version: String,
    consensus: Consensus,
    max_block_size: usize,
    miner_address: String,
    pow_budget: Duration,
}

/// The blockchain engine
pub struct Blockchain {
    inner: RwLock<ChainInner>,
    pub accounts: Accounts,
    pub utxos: UtxoSet,
    pub mempool: Mempool,
}

impl Blockchain {
    /// Create a chain holding only the genesis block
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ChainInner {
                blocks: vec![Block::genesis()],
                stake: HashMap::new(),
                block_reward: BLOCK_REWARD,
                protocol_version: "v1.0".to_string(),
                consensus: Consensus::ProofOfWork,
                max_block_size: MAX_BLOCK_SIZE,
                miner_address: String::new(),
                pow_budget: DEFAULT_POW_BUDGET,
            }),
            accounts: Accounts::new(),
            utxos: UtxoSet::new(),
            mempool: Mempool::new(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Chain height (genesis is height 0)
    pub fn height(&self) -> u64 {
        self.inner.read().unwrap().blocks.len() as u64 - 1
    }

    pub fn latest_block(&self) -> Block {
        self.inner
            .read()
            .unwrap()
            .blocks
            .last()
            .expect("chain always holds the genesis block")
            .clone()
    }

    /// Snapshot of the whole chain
    pub fn blocks(&self) -> Vec<Block> {
        self.inner.read().unwrap().blocks.clone()
    }

    pub fn block_reward(&self) -> u64 {
        self.inner.read().unwrap().block_reward
    }

    pub fn protocol_version(&self) -> String {
        self.inner.read().unwrap().protocol_version.clone()
    }

    pub fn consensus(&self) -> Consensus {
        self.inner.read().unwrap().consensus
    }

    pub fn max_block_size(&self) -> usize {
        self.inner.read().unwrap().max_block_size
    }

    pub fn stake(&self) -> HashMap<String, u64> {
        self.inner.read().unwrap().stake.clone()
    }

    /// Find a transaction by hash, searching the mempool first and the
    /// chain second
    pub fn find_transaction(&self, tx_id: &str) -> Option<Transaction> {
        if let Some(tx) = self.mempool.get(tx_id) {
            return Some(tx);
        }
        let inner = self.inner.read().unwrap();
        inner
            .blocks
            .iter()
            .flat_map(|b| &b.transactions)
            .find(|tx| tx.hash() == tx_id)
            .cloned()
    }

    // ------------------------------------------------------------------
    // Parameter mutators
    // ------------------------------------------------------------------

    pub fn set_consensus(&self, consensus: Consensus) {
        self.inner.write().unwrap().consensus = consensus;
        log::info!("Consensus algorithm set to {consensus}");
    }

    pub fn set_max_block_size(&self, size: usize) {
        self.inner.write().unwrap().max_block_size = size;
        log::info!("Max block size set to {size} bytes");
    }

    pub fn set_block_reward(&self, reward: u64) {
        self.inner.write().unwrap().block_reward = reward;
        log::info!("Block reward set to {reward}");
    }

    pub fn upgrade_protocol(&self, version: &str) {
        self.inner.write().unwrap().protocol_version = version.to_string();
        log::info!("Protocol upgraded to version {version}");
    }

    /// Set an address's stake weight; zero removes the entry
    pub fn set_stake(&self, address: &str, weight: u64) {
        let mut inner = self.inner.write().unwrap();
        if weight == 0 {
            inner.stake.remove(address);
        } else {
            inner.stake.insert(address.to_string(), weight);
        }
    }

    pub fn set_miner_address(&self, address: &str) {
        self.inner.write().unwrap().miner_address = address.to_string();
    }

    /// Override the proof-of-work wall-clock budget
    pub fn set_pow_budget(&self, budget: Duration) {
        self.inner.write().unwrap().pow_budget = budget;
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Admit a transaction to the mempool, validating it against the
    /// current ledger
    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), MempoolError> {
        self.mempool.add(tx, &self.accounts, &self.utxos)
    }

    // ------------------------------------------------------------------
    // Difficulty
    // ------------------------------------------------------------------

    /// Difficulty for the next block. Retargets only when the chain length
    /// is a multiple of `ADJUSTMENT_INTERVAL`; otherwise the tip's
    /// difficulty carries over.
    pub fn adjust_difficulty(&self) -> u32 {
        retarget(&self.inner.read().unwrap().blocks)
    }

    // ------------------------------------------------------------------
    // Block production
    // ------------------------------------------------------------------

    /// Assemble, mine and append a proof-of-work block from the given
    /// candidate transactions. Mined transactions leave the mempool and
    /// their fees are credited to the miner.
    ///
    /// The candidate block is assembled under the writer lock, but the
    /// nonce search itself runs unlocked so readers and the gossip
    /// handlers stay live while mining. The lock is reacquired to
    /// validate against whatever the tip is by then and append.
    pub fn append_pow(&self, candidates: Vec<Transaction>) -> Result<Block, ChainError> {
        let (mut block, miner, pow_budget) = {
            let mut inner = self.inner.write().unwrap();

            let difficulty = retarget(&inner.blocks);
            let tip = inner
                .blocks
                .last()
                .expect("chain always holds the genesis block")
                .clone();
            let height = inner.blocks.len() as u64;

            if inner.miner_address.is_empty() {
                inner.miner_address = select_miner(&inner.stake, &self.accounts);
            }
            let miner = inner.miner_address.clone();

            let reward_tx = Transaction::reward(&miner, inner.block_reward, height);
            let included = self.fill_block(reward_tx, candidates, inner.max_block_size);

            let mut block = Block::new(included, &tip.hash, difficulty);
            block.index = height;
            (block, miner, inner.pow_budget)
        };

        let (nonce, hash) = ProofOfWork::with_budget(&block, pow_budget).run()?;
        block.nonce = nonce;
        block.hash = hash;

        let mut inner = self.inner.write().unwrap();
        let tip = inner
            .blocks
            .last()
            .expect("chain always holds the genesis block")
            .clone();
        if !is_valid_new_block_with(&block, &tip, true) {
            // The tip moved while the search ran; the mined block is stale
            return Err(ChainError::InvalidBlock(
                "mined block no longer extends the tip".to_string(),
            ));
        }

        inner.blocks.push(block.clone());
        drop(inner);

        self.finish_append(&block, &miner);
        log::info!(
            "Appended PoW block {} ({} txs, difficulty {})",
            block.index,
            block.transactions.len(),
            block.difficulty
        );
        Ok(block)
    }

    /// Append a block under proof of stake. Falls back to proof of work
    /// when nobody holds stake.
    pub fn append_pos(&self, candidates: Vec<Transaction>) -> Result<Block, ChainError> {
        let proposer = self.select_proposer();
        if proposer.is_empty() {
            log::warn!("No stake in the network, falling back to PoW");
            return self.append_pow(candidates);
        }

        let mut inner = self.inner.write().unwrap();
        let tip = inner
            .blocks
            .last()
            .expect("chain always holds the genesis block")
            .clone();
        let height = inner.blocks.len() as u64;

        let reward_tx = Transaction::reward(&proposer, inner.block_reward, height);
        let included = self.fill_block(reward_tx, candidates, inner.max_block_size);

        let mut block = Block::new(included, &tip.hash, tip.difficulty);
        block.index = height;
        block.hash = block.calculate_hash();

        if !is_valid_new_block_with(&block, &tip, false) {
            return Err(ChainError::InvalidBlock(
                "proposed block failed validation".to_string(),
            ));
        }

        inner.blocks.push(block.clone());
        drop(inner);

        self.finish_append(&block, &proposer);
        log::info!(
            "Appended PoS block {} proposed by {}",
            block.index,
            short(&proposer)
        );
        Ok(block)
    }

    /// Reward tx first, then candidates by descending fee while the size
    /// cap holds; oversize or invalid candidates are skipped individually.
    fn fill_block(
        &self,
        reward_tx: Transaction,
        mut candidates: Vec<Transaction>,
        max_size: usize,
    ) -> Vec<Transaction> {
        candidates.sort_by(|a, b| b.fee.cmp(&a.fee));

        let mut included = vec![reward_tx.clone()];
        let mut size = reward_tx.size();

        for tx in candidates {
            if !self.is_block_candidate(&tx) {
                continue;
            }
            let tx_size = tx.size();
            if size + tx_size > max_size {
                continue;
            }
            size += tx_size;
            included.push(tx);
        }

        included
    }

    /// Structural checks at block-building time. Balance and nonce were
    /// already enforced (and applied) at mempool admission, so only the
    /// signature, the fee floor and sender existence are re-checked here.
    fn is_block_candidate(&self, tx: &Transaction) -> bool {
        if tx.is_reward() {
            return true;
        }
        if tx.fee < MIN_TRANSACTION_FEE {
            return false;
        }
        match self.accounts.get(&tx.sender) {
            Some(account) => tx.verify(&account.public_key),
            None => false,
        }
    }

    /// Post-append bookkeeping: credit the block's own reward output,
    /// route fees to the producer and drop mined transactions from the
    /// mempool.
    fn finish_append(&self, block: &Block, producer: &str) {
        if let Some(reward) = block.transactions.first() {
            if reward.is_reward() {
                self.utxos.add(Utxo {
                    tx_id: reward.hash(),
                    index: 0,
                    amount: reward.amount,
                    owner: reward.recipient.clone(),
                });
                self.accounts
                    .update(&reward.recipient, |a| a.credit(reward.amount));
            }
        }

        for tx in &block.transactions {
            if !tx.is_reward() {
                tx.distribute_fee(&self.utxos, producer);
            }
            self.mempool.remove(tx);
        }
    }

    /// Append a block produced elsewhere after validating it against the
    /// current tip. Returns whether the block was accepted.
    pub fn accept_block(&self, block: Block) -> bool {
        let mut inner = self.inner.write().unwrap();
        let tip = inner
            .blocks
            .last()
            .expect("chain always holds the genesis block")
            .clone();
        let require_pow = inner.consensus == Consensus::ProofOfWork;

        if !is_valid_new_block_with(&block, &tip, require_pow) {
            return false;
        }

        inner.blocks.push(block.clone());
        drop(inner);

        let producer = block
            .transactions
            .first()
            .map(|tx| tx.recipient.clone())
            .unwrap_or_default();
        self.finish_append(&block, &producer);
        true
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Validate a block against its predecessor under the current
    /// consensus mode
    pub fn is_valid_new_block(&self, new: &Block, prev: &Block) -> bool {
        let require_pow = self.consensus() == Consensus::ProofOfWork;
        is_valid_new_block_with(new, prev, require_pow)
    }

    /// Pairwise-validate a candidate chain from index 1 upward
    pub fn is_valid_chain(&self, blocks: &[Block]) -> bool {
        let require_pow = self.consensus() == Consensus::ProofOfWork;
        (1..blocks.len()).all(|i| is_valid_new_block_with(&blocks[i], &blocks[i - 1], require_pow))
    }

    // ------------------------------------------------------------------
    // Proposer and miner selection
    // ------------------------------------------------------------------

    /// Stake-weighted random proposer selection. Returns an empty string
    /// when no stake exists.
    pub fn select_proposer(&self) -> String {
        let inner = self.inner.read().unwrap();
        let total: u64 = inner.stake.values().sum();
        if total == 0 {
            return String::new();
        }

        let draw = rand::thread_rng().gen_range(0..total);
        let mut running = 0u64;
        for (address, stake) in &inner.stake {
            running += stake;
            if running >= draw {
                return address.clone();
            }
        }
        String::new()
    }

    /// Address with the highest stake; falls back to any registered
    /// account; empty when neither exists
    pub fn select_miner_address(&self) -> String {
        let inner = self.inner.read().unwrap();
        select_miner(&inner.stake, &self.accounts)
    }

    // ------------------------------------------------------------------
    // Reorganisation
    // ------------------------------------------------------------------

    /// Replace the local chain with a strictly longer valid one and
    /// rebuild the ledger by replaying every block from genesis. Returns
    /// whether a replacement happened.
    pub fn replace_chain(&self, new_blocks: Vec<Block>) -> bool {
        {
            let inner = self.inner.read().unwrap();
            if new_blocks.len() <= inner.blocks.len() {
                return false;
            }
        }
        if !self.is_valid_chain(&new_blocks) {
            log::warn!("Rejected replacement chain: validation failed");
            return false;
        }

        let mut inner = self.inner.write().unwrap();
        if new_blocks.len() <= inner.blocks.len() {
            return false;
        }
        let old_len = inner.blocks.len();
        inner.blocks = new_blocks;
        let blocks = inner.blocks.clone();
        drop(inner);

        self.rebuild_state(&blocks);
        log::info!(
            "Chain reorganised: {} -> {} blocks",
            old_len,
            blocks.len()
        );
        true
    }

    /// Replay a chain from genesis into a fresh UTXO set, then resync the
    /// account balances and nonces from the result.
    fn rebuild_state(&self, blocks: &[Block]) {
        self.utxos.clear();
        self.accounts.reset_balances();

        for block in blocks {
            let producer = block
                .transactions
                .first()
                .map(|tx| tx.recipient.clone())
                .unwrap_or_default();

            for tx in &block.transactions {
                if tx.is_reward() {
                    self.utxos.add(Utxo {
                        tx_id: tx.hash(),
                        index: 0,
                        amount: tx.amount,
                        owner: tx.recipient.clone(),
                    });
                    continue;
                }

                let needed = tx.amount + tx.fee;
                let (selected, total) = self.utxos.find(&tx.sender, needed);
                if total >= needed {
                    self.utxos.spend(&selected);
                    self.utxos.add(Utxo {
                        tx_id: tx.hash(),
                        index: 0,
                        amount: tx.amount,
                        owner: tx.recipient.clone(),
                    });
                    if total > needed {
                        self.utxos.add(Utxo {
                            tx_id: tx.hash(),
                            index: 1,
                            amount: total - needed,
                            owner: tx.sender.clone(),
                        });
                    }
                } else {
                    // Inputs from outside our replay horizon; credit the
                    // recipient so downstream spends still resolve.
                    log::warn!("Replay: unmatched inputs for tx {}", short(&tx.hash()));
                    self.utxos.add(Utxo {
                        tx_id: tx.hash(),
                        index: 0,
                        amount: tx.amount,
                        owner: tx.recipient.clone(),
                    });
                }
                tx.distribute_fee(&self.utxos, &producer);
            }
        }

        for address in self.accounts.addresses() {
            let balance = self.utxos.balance(&address);
            self.accounts.update(&address, |a| a.balance = balance);
        }
        for block in blocks {
            for tx in &block.transactions {
                if !tx.is_reward() {
                    let nonce = tx.nonce;
                    self.accounts
                        .update(&tx.sender, |a| a.nonce = a.nonce.max(nonce));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Genesis seeding
    // ------------------------------------------------------------------

    /// Seed an initial balance and mine the first post-genesis block so
    /// the ledger starts with a registered output
    pub fn seed_genesis_balance(&self, owner: &str, amount: u64) -> Result<Block, ChainError> {
        let seed = Transaction::new(crate::core::transaction::SYSTEM_SENDER, owner, amount, 0, 0);
        self.utxos.add(Utxo {
            tx_id: seed.hash(),
            index: 0,
            amount,
            owner: owner.to_string(),
        });
        self.accounts.update(owner, |a| a.credit(amount));
        self.append_pow(vec![seed])
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

/// Difficulty retarget over the last `ADJUSTMENT_INTERVAL` blocks
fn retarget(blocks: &[Block]) -> u32 {
    let tip = blocks.last().expect("chain always holds the genesis block");
    if blocks.len() % ADJUSTMENT_INTERVAL != 0 {
        return tip.difficulty;
    }

    let window_start = &blocks[blocks.len() - ADJUSTMENT_INTERVAL];
    let expected = ADJUSTMENT_INTERVAL as i64 * TARGET_BLOCK_SECS;
    let actual = tip.timestamp - window_start.timestamp;

    if actual < expected / 2 {
        window_start.difficulty + 1
    } else if actual > expected * 2 {
        window_start.difficulty.saturating_sub(1).max(1)
    } else {
        window_start.difficulty
    }
}

fn is_valid_new_block_with(new: &Block, prev: &Block, require_pow: bool) -> bool {
    if prev.index + 1 != new.index {
        return false;
    }
    if prev.hash != new.previous_hash {
        return false;
    }
    if require_pow && !ProofOfWork::validate(new) {
        return false;
    }
    new.calculate_hash() == new.hash
}

/// Highest-stake address with a stable tie-break, falling back to the
/// first registered account
fn select_miner(stake: &HashMap<String, u64>, accounts: &Accounts) -> String {
    let mut best: Option<(&String, u64)> = None;
    for (address, &weight) in stake {
        let better = match best {
            None => weight > 0,
            Some((best_addr, best_weight)) => {
                weight > best_weight || (weight == best_weight && address < best_addr)
            }
        };
        if better {
            best = Some((address, weight));
        }
    }
    if let Some((address, _)) = best {
        return address.clone();
    }
    accounts.addresses().into_iter().next().unwrap_or_default()
}

fn short(s: &str) -> &str {
    &s[..s.len().min(12)]
}
