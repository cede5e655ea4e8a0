//! Peer registry and rate limiting
//!
//! Tracks the set of known peer addresses plus a per-peer request window.
//! A peer silent for the whole window gets a fresh counter; one exceeding
//! the cap within the window is dropped after its first decoded message.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Rolling window for request counting
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(10);
/// Requests allowed per peer per window
pub const MAX_REQUESTS_PER_WINDOW: u32 = 100;
/// Dial attempts before giving a peer up for the call
pub const MAX_CONNECTION_RETRIES: u32 = 3;
/// Fixed pause between dial attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Peer-side errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Peer closed the connection")]
    Closed,
}

#[derive(Debug)]
struct RateState {
    last_request: Instant,
    count: u32,
}

/// Known peers and their request windows
#[derive(Debug, Default)]
pub struct PeerRegistry {
    known: Mutex<HashMap<String, bool>>,
    rates: Mutex<HashMap<String, RateState>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer address. Returns true when the address was new.
    pub fn insert(&self, address: &str) -> bool {
        let mut known = self.known.lock().unwrap();
        known.insert(address.to_string(), true).is_none()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.known.lock().unwrap().contains_key(address)
    }

    /// Snapshot of all known peer addresses
    pub fn peers(&self) -> Vec<String> {
        self.known.lock().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.known.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.lock().unwrap().is_empty()
    }

    /// Count a request from the peer against its rolling window.
    /// Returns `PeerError::RateLimited` above the cap.
    pub fn check_rate(&self, peer: &str) -> Result<(), PeerError> {
        let now = Instant::now();
        let mut rates = self.rates.lock().unwrap();

        let state = rates.entry(peer.to_string()).or_insert(RateState {
            last_request: now,
            count: 0,
        });

        if now.duration_since(state.last_request) > RATE_LIMIT_WINDOW {
            state.count = 0;
        }
        state.last_request = now;
        state.count += 1;

        if state.count > MAX_REQUESTS_PER_WINDOW {
            Err(PeerError::RateLimited)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let registry = PeerRegistry::new();
        assert!(registry.insert("127.0.0.1:9000"));
        assert!(!registry.insert("127.0.0.1:9000"));
        assert!(registry.contains("127.0.0.1:9000"));
        assert!(!registry.contains("127.0.0.1:9001"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rate_limit_caps_requests() {
        let registry = PeerRegistry::new();
        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            registry.check_rate("peer").unwrap();
        }
        assert!(matches!(
            registry.check_rate("peer"),
            Err(PeerError::RateLimited)
        ));
    }

    #[test]
    fn test_rate_limit_is_per_peer() {
        let registry = PeerRegistry::new();
        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            registry.check_rate("a").unwrap();
        }
        registry.check_rate("b").unwrap();
    }
}
