//! Unspent transaction output ledger
//!
//! Outputs are indexed by `(tx_id, index)` in a nested map. All mutation
//! happens behind the set's own lock so callers can share it freely.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// An unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Transaction that created this output
    pub tx_id: String,
    /// Output position within that transaction
    pub index: u32,
    /// Value carried by the output
    pub amount: u64,
    /// Owning address
    pub owner: String,
}

/// Thread-safe set of all unspent outputs
#[derive(Debug, Default)]
pub struct UtxoSet {
    inner: RwLock<HashMap<String, HashMap<u32, Utxo>>>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Greedily accumulate outputs owned by `owner` until the total reaches
    /// `target`. Returns whatever was gathered along with its total; the
    /// caller decides whether the total suffices.
    pub fn find(&self, owner: &str, target: u64) -> (Vec<Utxo>, u64) {
        let map = self.inner.read().unwrap();

        let mut selected = Vec::new();
        let mut total = 0u64;

        for outputs in map.values() {
            for utxo in outputs.values() {
                if utxo.owner == owner {
                    total += utxo.amount;
                    selected.push(utxo.clone());
                    if total >= target {
                        return (selected, total);
                    }
                }
            }
        }

        (selected, total)
    }

    /// Remove the given outputs from the set. Empty inner maps are dropped
    /// so the outer map never accumulates dead transaction entries.
    pub fn spend(&self, utxos: &[Utxo]) {
        let mut map = self.inner.write().unwrap();

        for spent in utxos {
            if let Some(outputs) = map.get_mut(&spent.tx_id) {
                outputs.remove(&spent.index);
                if outputs.is_empty() {
                    map.remove(&spent.tx_id);
                }
            }
        }
    }

    /// Add a new unspent output
    pub fn add(&self, utxo: Utxo) {
        let mut map = self.inner.write().unwrap();
        map.entry(utxo.tx_id.clone()).or_default().insert(utxo.index, utxo);
    }

    /// Whether the owner has any output in the set
    pub fn has(&self, owner: &str) -> bool {
        let map = self.inner.read().unwrap();
        map.values()
            .any(|outputs| outputs.values().any(|u| u.owner == owner))
    }

    /// Total value of all outputs owned by an address
    pub fn balance(&self, owner: &str) -> u64 {
        let map = self.inner.read().unwrap();
        map.values()
            .flat_map(|outputs| outputs.values())
            .filter(|u| u.owner == owner)
            .map(|u| u.amount)
            .sum()
    }

    /// Total value held in the set across all owners
    pub fn total_value(&self) -> u64 {
        let map = self.inner.read().unwrap();
        map.values()
            .flat_map(|outputs| outputs.values())
            .map(|u| u.amount)
            .sum()
    }

    /// Drop every output. Used before replaying a replacement chain.
    pub fn clear(&self) {
        self.inner.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().values().map(|o| o.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(tx_id: &str, index: u32, amount: u64, owner: &str) -> Utxo {
        Utxo {
            tx_id: tx_id.to_string(),
            index,
            amount,
            owner: owner.to_string(),
        }
    }

    #[test]
    fn test_add_and_balance() {
        let set = UtxoSet::new();
        set.add(utxo("tx1", 0, 40, "alice"));
        set.add(utxo("tx1", 1, 60, "alice"));
        set.add(utxo("tx2", 0, 25, "bob"));

        assert_eq!(set.balance("alice"), 100);
        assert_eq!(set.balance("bob"), 25);
        assert_eq!(set.balance("carol"), 0);
        assert_eq!(set.total_value(), 125);
    }

    #[test]
    fn test_find_stops_at_target() {
        let set = UtxoSet::new();
        set.add(utxo("tx1", 0, 40, "alice"));
        set.add(utxo("tx2", 0, 40, "alice"));
        set.add(utxo("tx3", 0, 40, "alice"));

        let (selected, total) = set.find("alice", 50);
        assert!(total >= 50);
        assert!(selected.len() < 3);
    }

    #[test]
    fn test_find_insufficient_returns_partial() {
        let set = UtxoSet::new();
        set.add(utxo("tx1", 0, 30, "alice"));

        let (selected, total) = set.find("alice", 100);
        assert_eq!(total, 30);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_spend_restores_prior_state() {
        let set = UtxoSet::new();
        let u = utxo("tx1", 0, 40, "alice");

        set.add(u.clone());
        assert_eq!(set.balance("alice"), 40);

        set.spend(std::slice::from_ref(&u));
        assert_eq!(set.balance("alice"), 0);
        assert!(!set.has("alice"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_spend_keeps_sibling_outputs() {
        let set = UtxoSet::new();
        set.add(utxo("tx1", 0, 40, "alice"));
        set.add(utxo("tx1", 1, 10, "bob"));

        set.spend(&[utxo("tx1", 0, 40, "alice")]);
        assert_eq!(set.balance("bob"), 10);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_has() {
        let set = UtxoSet::new();
        assert!(!set.has("alice"));
        set.add(utxo("tx1", 0, 1, "alice"));
        assert!(set.has("alice"));
    }
}
