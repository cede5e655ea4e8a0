//! ECDSA key management
//!
//! Key pair generation, signing, and verification on the NIST P-256 curve.
//! Signatures travel as hex-encoded `(r, s)` pairs so they can be embedded
//! in JSON payloads without a binary sidecar.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// An ECDSA signature as hex-encoded scalar components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParts {
    pub r: String,
    pub s: String,
}

impl SignatureParts {
    fn from_signature(sig: &Signature) -> Self {
        let (r, s) = sig.split_bytes();
        Self {
            r: hex::encode(r),
            s: hex::encode(s),
        }
    }

    fn to_signature(&self) -> Result<Signature, CryptoError> {
        let r = hex::decode(&self.r).map_err(|_| CryptoError::InvalidSignature)?;
        let s = hex::decode(&self.s).map_err(|_| CryptoError::InvalidSignature)?;
        if r.len() != 32 || s.len() != 32 {
            return Err(CryptoError::InvalidSignature);
        }
        Signature::from_scalars(
            *p256::FieldBytes::from_slice(&r),
            *p256::FieldBytes::from_slice(&s),
        )
        .map_err(|_| CryptoError::InvalidSignature)
    }
}

/// A P-256 key pair
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh random key pair
    pub fn generate() -> Result<Self, CryptoError> {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    /// Rebuild a key pair from an existing secret key
    pub fn from_secret_key(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Public key as hex-encoded SEC1 uncompressed bytes
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.to_sec1_bytes())
    }

    /// Sign a message: ECDSA over SHA-256 of the message bytes
    pub fn sign(&self, message: &[u8]) -> Result<SignatureParts, CryptoError> {
        let signing_key = SigningKey::from(&self.secret);
        let signature: Signature = signing_key.sign(message);
        Ok(SignatureParts::from_signature(&signature))
    }

    /// Verify a signature against this key pair's public key
    pub fn verify(&self, message: &[u8], sig: &SignatureParts) -> bool {
        let Ok(signature) = sig.to_signature() else {
            return false;
        };
        VerifyingKey::from(&self.public)
            .verify(message, &signature)
            .is_ok()
    }
}

/// Parse a public key from hex-encoded SEC1 bytes
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(hex_key).map_err(|_| CryptoError::InvalidPublicKey)?;
    PublicKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Verify a signature against a hex-encoded public key.
/// Returns false for malformed keys or signatures.
pub fn verify_signature(public_key_hex: &str, message: &[u8], sig: &SignatureParts) -> bool {
    let Ok(public) = public_key_from_hex(public_key_hex) else {
        return false;
    };
    let Ok(signature) = sig.to_signature() else {
        return false;
    };
    VerifyingKey::from(&public)
        .verify(message, &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let keys = KeyPair::generate().unwrap();
        assert!(!keys.public_key_hex().is_empty());
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = KeyPair::generate().unwrap();
        let sig = keys.sign(b"hello chain").unwrap();
        assert!(keys.verify(b"hello chain", &sig));
        assert!(!keys.verify(b"tampered", &sig));
    }

    #[test]
    fn test_verify_with_wrong_key() {
        let keys = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let sig = keys.sign(b"message").unwrap();
        assert!(!verify_signature(&other.public_key_hex(), b"message", &sig));
        assert!(verify_signature(&keys.public_key_hex(), b"message", &sig));
    }

    #[test]
    fn test_signature_roundtrip_encoding() {
        let keys = KeyPair::generate().unwrap();
        let sig = keys.sign(b"encode me").unwrap();
        let rebuilt = sig.to_signature().unwrap();
        assert_eq!(SignatureParts::from_signature(&rebuilt), sig);
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let keys = KeyPair::generate().unwrap();
        let bad = SignatureParts {
            r: "zz".to_string(),
            s: "00".to_string(),
        };
        assert!(!keys.verify(b"message", &bad));
    }
}
