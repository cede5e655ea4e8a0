//! Minimal in-memory contract engine
//!
//! A thin stub kept for the CLI surface: contracts are opaque code strings
//! keyed by a derived id, and execution records and returns tagged values.
//! There is no interpreter.

use crate::crypto::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Contract engine errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContractError {
    #[error("Contract not found: {0}")]
    NotFound(String),
    #[error("Contract code cannot be empty")]
    EmptyCode,
}

/// A tagged value passed to and returned from contract calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Contract {
    code: String,
    owner: String,
    storage: HashMap<String, Value>,
}

/// In-memory contract store
#[derive(Debug, Default)]
pub struct ContractEngine {
    contracts: Mutex<HashMap<String, Contract>>,
}

impl ContractEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a contract; the id is derived from the code and owner
    pub fn deploy(&self, code: &str, owner: &str) -> Result<String, ContractError> {
        if code.is_empty() {
            return Err(ContractError::EmptyCode);
        }
        let id = sha256_hex(format!("{code}{owner}").as_bytes())[..16].to_string();
        self.contracts.lock().unwrap().insert(
            id.clone(),
            Contract {
                code: code.to_string(),
                owner: owner.to_string(),
                storage: HashMap::new(),
            },
        );
        Ok(id)
    }

    /// Execute a method: stores the first parameter under the method name
    /// and returns the previously stored value, if any
    pub fn execute(
        &self,
        contract_id: &str,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Option<Value>, ContractError> {
        let mut contracts = self.contracts.lock().unwrap();
        let contract = contracts
            .get_mut(contract_id)
            .ok_or_else(|| ContractError::NotFound(contract_id.to_string()))?;

        let previous = contract.storage.get(method).cloned();
        if let Some(value) = params.into_iter().next() {
            contract.storage.insert(method.to_string(), value);
        }
        Ok(previous)
    }

    pub fn owner_of(&self, contract_id: &str) -> Option<String> {
        self.contracts
            .lock()
            .unwrap()
            .get(contract_id)
            .map(|c| c.owner.clone())
    }

    pub fn code_of(&self, contract_id: &str) -> Option<String> {
        self.contracts
            .lock()
            .unwrap()
            .get(contract_id)
            .map(|c| c.code.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_and_execute() {
        let engine = ContractEngine::new();
        let id = engine.deploy("counter", "alice").unwrap();
        assert_eq!(engine.owner_of(&id).as_deref(), Some("alice"));

        let first = engine
            .execute(&id, "set", vec![Value::Int(42)])
            .unwrap();
        assert_eq!(first, None);

        let second = engine.execute(&id, "set", vec![]).unwrap();
        assert_eq!(second, Some(Value::Int(42)));
    }

    #[test]
    fn test_empty_code_rejected() {
        let engine = ContractEngine::new();
        assert_eq!(engine.deploy("", "alice"), Err(ContractError::EmptyCode));
    }

    #[test]
    fn test_unknown_contract() {
        let engine = ContractEngine::new();
        assert!(matches!(
            engine.execute("nope", "m", vec![]),
            Err(ContractError::NotFound(_))
        ));
    }
}
