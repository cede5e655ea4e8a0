//! Cryptographic primitives: SHA-256 digests, P-256 ECDSA keys, merkle roots

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{meets_difficulty, sha256, sha256_hex};
pub use keys::{public_key_from_hex, verify_signature, CryptoError, KeyPair, SignatureParts};
pub use merkle::merkle_root;
