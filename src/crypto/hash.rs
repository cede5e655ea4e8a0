//! SHA-256 hashing utilities
//!
//! Every digest in the chain (block hashes, transaction IDs, merkle nodes)
//! is a lowercase hex-encoded SHA-256.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes the SHA-256 hash and returns it as a lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Checks whether a hex-encoded hash meets the difficulty target.
/// Difficulty counts leading '0' hex characters.
pub fn meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    hash_hex.len() >= difficulty as usize
        && hash_hex
            .bytes()
            .take(difficulty as usize)
            .all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ff00", 2));
        assert!(meets_difficulty("0fff", 1));
        assert!(!meets_difficulty("0fff", 2));
        assert!(meets_difficulty("ffff", 0));
        assert!(!meets_difficulty("0", 2));
    }
}
