//! Minimal decentralised identifier registry
//!
//! Maps DID ids to a public key and attribute bag. Authentication verifies
//! an ECDSA signature over a challenge message with the registered key.

use crate::crypto::{sha256_hex, verify_signature, SignatureParts};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// DID registry errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DidError {
    #[error("DID not found: {0}")]
    NotFound(String),
    #[error("Public key cannot be empty")]
    EmptyKey,
}

#[derive(Debug, Clone)]
struct DidRecord {
    owner: String,
    public_key: String,
    attributes: HashMap<String, String>,
}

/// In-memory DID registry
#[derive(Debug, Default)]
pub struct DidRegistry {
    records: Mutex<HashMap<String, DidRecord>>,
}

impl DidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DID for an owner; the id is derived from the key
    pub fn register(
        &self,
        owner: &str,
        public_key: &str,
        attributes: HashMap<String, String>,
    ) -> Result<String, DidError> {
        if public_key.is_empty() {
            return Err(DidError::EmptyKey);
        }
        let id = format!("did:nano:{}", &sha256_hex(public_key.as_bytes())[..24]);
        self.records.lock().unwrap().insert(
            id.clone(),
            DidRecord {
                owner: owner.to_string(),
                public_key: public_key.to_string(),
                attributes,
            },
        );
        Ok(id)
    }

    /// Verify a signature over `message` with the DID's registered key
    pub fn authenticate(
        &self,
        did: &str,
        signature: &SignatureParts,
        message: &str,
    ) -> Result<bool, DidError> {
        let records = self.records.lock().unwrap();
        let record = records
            .get(did)
            .ok_or_else(|| DidError::NotFound(did.to_string()))?;
        Ok(verify_signature(
            &record.public_key,
            message.as_bytes(),
            signature,
        ))
    }

    pub fn owner_of(&self, did: &str) -> Option<String> {
        self.records.lock().unwrap().get(did).map(|r| r.owner.clone())
    }

    pub fn attribute(&self, did: &str, key: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(did)
            .and_then(|r| r.attributes.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_register_and_authenticate() {
        let registry = DidRegistry::new();
        let keys = KeyPair::generate().unwrap();

        let did = registry
            .register("alice", &keys.public_key_hex(), HashMap::new())
            .unwrap();
        assert!(did.starts_with("did:nano:"));
        assert_eq!(registry.owner_of(&did).as_deref(), Some("alice"));

        let sig = keys.sign(b"challenge").unwrap();
        assert!(registry.authenticate(&did, &sig, "challenge").unwrap());
        assert!(!registry.authenticate(&did, &sig, "other").unwrap());
    }

    #[test]
    fn test_unknown_did() {
        let registry = DidRegistry::new();
        let keys = KeyPair::generate().unwrap();
        let sig = keys.sign(b"x").unwrap();
        assert_eq!(
            registry.authenticate("did:nano:missing", &sig, "x"),
            Err(DidError::NotFound("did:nano:missing".to_string()))
        );
    }

    #[test]
    fn test_attributes() {
        let registry = DidRegistry::new();
        let keys = KeyPair::generate().unwrap();
        let mut attrs = HashMap::new();
        attrs.insert("role".to_string(), "validator".to_string());

        let did = registry
            .register("alice", &keys.public_key_hex(), attrs)
            .unwrap();
        assert_eq!(registry.attribute(&did, "role").as_deref(), Some("validator"));
        assert_eq!(registry.attribute(&did, "nope"), None);
    }

    #[test]
    fn test_empty_key_rejected() {
        let registry = DidRegistry::new();
        assert_eq!(
            registry.register("alice", "", HashMap::new()),
            Err(DidError::EmptyKey)
        );
    }
}
