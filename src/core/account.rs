//! Account tracking for the blockchain
//!
//! Accounts mirror the UTXO ledger: an account's balance equals the sum of
//! its unspent outputs, and its nonce records the newest accepted
//! transaction from that sender.

use std::collections::HashMap;
use std::sync::RwLock;

/// A single account
#[derive(Debug, Clone)]
pub struct Account {
    /// Account address (hex-encoded public key)
    pub address: String,
    /// Spendable balance
    pub balance: u64,
    /// Nonce of the most recent accepted transaction
    pub nonce: u64,
    /// Hex-encoded SEC1 public key used for signature checks
    pub public_key: String,
}

impl Account {
    pub fn new(address: &str, initial_balance: u64, public_key: &str) -> Self {
        Self {
            address: address.to_string(),
            balance: initial_balance,
            nonce: 0,
            public_key: public_key.to_string(),
        }
    }

    /// Add to the account balance
    pub fn credit(&mut self, amount: u64) {
        self.balance += amount;
    }

    /// Subtract from the account balance, saturating at zero
    pub fn debit(&mut self, amount: u64) {
        self.balance = self.balance.saturating_sub(amount);
    }
}

/// Thread-safe account map
#[derive(Debug, Default)]
pub struct Accounts {
    inner: RwLock<HashMap<String, Account>>,
}

impl Accounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account, replacing any previous entry for the address
    pub fn register(&self, account: Account) {
        let mut map = self.inner.write().unwrap();
        map.insert(account.address.clone(), account);
    }

    pub fn exists(&self, address: &str) -> bool {
        self.inner.read().unwrap().contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<Account> {
        self.inner.read().unwrap().get(address).cloned()
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.inner
            .read()
            .unwrap()
            .get(address)
            .map(|a| a.balance)
            .unwrap_or(0)
    }

    pub fn nonce(&self, address: &str) -> u64 {
        self.inner
            .read()
            .unwrap()
            .get(address)
            .map(|a| a.nonce)
            .unwrap_or(0)
    }

    /// Mutate an account in place. Returns false when the address is unknown.
    pub fn update<F>(&self, address: &str, f: F) -> bool
    where
        F: FnOnce(&mut Account),
    {
        let mut map = self.inner.write().unwrap();
        match map.get_mut(address) {
            Some(account) => {
                f(account);
                true
            }
            None => false,
        }
    }

    /// All registered addresses, sorted for a stable pick order
    pub fn addresses(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.inner.read().unwrap().keys().cloned().collect();
        addrs.sort();
        addrs
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Reset every balance and nonce while keeping registered keys.
    /// Used when the chain is rebuilt after a reorganisation.
    pub fn reset_balances(&self) {
        let mut map = self.inner.write().unwrap();
        for account in map.values_mut() {
            account.balance = 0;
            account.nonce = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_and_debit() {
        let mut account = Account::new("alice", 100, "pubkey");
        account.credit(50);
        assert_eq!(account.balance, 150);
        account.debit(70);
        assert_eq!(account.balance, 80);
        account.debit(500);
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_register_and_lookup() {
        let accounts = Accounts::new();
        accounts.register(Account::new("alice", 100, "pk"));

        assert!(accounts.exists("alice"));
        assert!(!accounts.exists("bob"));
        assert_eq!(accounts.balance("alice"), 100);
        assert_eq!(accounts.balance("bob"), 0);
        assert_eq!(accounts.nonce("alice"), 0);
    }

    #[test]
    fn test_update() {
        let accounts = Accounts::new();
        accounts.register(Account::new("alice", 100, "pk"));

        assert!(accounts.update("alice", |a| {
            a.debit(30);
            a.nonce = 1;
        }));
        assert_eq!(accounts.balance("alice"), 70);
        assert_eq!(accounts.nonce("alice"), 1);

        assert!(!accounts.update("bob", |a| a.credit(1)));
    }

    #[test]
    fn test_reset_balances_keeps_keys() {
        let accounts = Accounts::new();
        accounts.register(Account::new("alice", 100, "pk"));
        accounts.update("alice", |a| a.nonce = 5);

        accounts.reset_balances();

        let alice = accounts.get("alice").unwrap();
        assert_eq!(alice.balance, 0);
        assert_eq!(alice.nonce, 0);
        assert_eq!(alice.public_key, "pk");
    }
}
