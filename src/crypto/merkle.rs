//! Merkle root computation over transaction hashes
//!
//! Operates on hex-encoded hashes. Pairs are concatenated as strings and
//! re-hashed; an odd tail element is hashed alone rather than paired with
//! itself, which diverges from Bitcoin-style trees on purpose.

use super::hash::sha256_hex;

/// Calculate the merkle root of a list of hex-encoded transaction hashes.
///
/// An empty list yields the empty string; a single element is its own root.
pub fn merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return String::new();
    }
    if hashes.len() == 1 {
        return hashes[0].clone();
    }

    let mut level = Vec::with_capacity(hashes.len() / 2 + 1);
    let mut pairs = hashes.chunks_exact(2);
    for pair in &mut pairs {
        let combined = format!("{}{}", pair[0], pair[1]);
        level.push(sha256_hex(combined.as_bytes()));
    }
    if let [tail] = pairs.remainder() {
        level.push(sha256_hex(tail.as_bytes()));
    }

    merkle_root(&level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256_hex;

    fn leaf(data: &str) -> String {
        sha256_hex(data.as_bytes())
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(merkle_root(&[]), "");
    }

    #[test]
    fn test_single_element_is_root() {
        let h = leaf("tx1");
        assert_eq!(merkle_root(std::slice::from_ref(&h)), h);
    }

    #[test]
    fn test_two_elements() {
        let a = leaf("tx1");
        let b = leaf("tx2");
        let expected = sha256_hex(format!("{a}{b}").as_bytes());
        assert_eq!(merkle_root(&[a, b]), expected);
    }

    #[test]
    fn test_odd_tail_hashed_alone() {
        let a = leaf("tx1");
        let b = leaf("tx2");
        let c = leaf("tx3");

        let left = sha256_hex(format!("{a}{b}").as_bytes());
        let right = sha256_hex(c.as_bytes());
        let expected = sha256_hex(format!("{left}{right}").as_bytes());

        assert_eq!(merkle_root(&[a, b, c]), expected);
    }

    #[test]
    fn test_leaf_order_matters() {
        let a = leaf("tx1");
        let b = leaf("tx2");
        let c = leaf("tx3");
        let d = leaf("tx4");

        let root = merkle_root(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let swapped = merkle_root(&[b, a, c, d]);
        assert_ne!(root, swapped);
    }
}
