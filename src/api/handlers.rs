//! HTTP handlers for the node API

use crate::core::block::Block;
use crate::core::blockchain::Blockchain;
use crate::core::transaction::Transaction;
use crate::crypto::KeyPair;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared state for all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Blockchain>,
    /// Node key used to sign transactions submitted through the API
    pub keys: Arc<KeyPair>,
}

#[derive(Serialize, Debug)]
pub struct BalanceResponse {
    pub balance: u64,
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
    pub fee: u64,
}

#[derive(Serialize, Debug)]
pub struct StatusResponse {
    pub status: String,
}

/// GET /balance?address= returns the spendable balance of an address
pub async fn get_balance(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<BalanceResponse>, (StatusCode, String)> {
    let address = params
        .get("address")
        .filter(|a| !a.is_empty())
        .ok_or((StatusCode::BAD_REQUEST, "Address is required".to_string()))?;

    Ok(Json(BalanceResponse {
        balance: state.engine.utxos.balance(address),
    }))
}

/// POST /send signs a transfer with the node key and admits it
pub async fn send_transaction(
    State(state): State<ApiState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let nonce = state.engine.accounts.nonce(&req.sender) + 1;
    let mut tx = Transaction::new(&req.sender, &req.recipient, req.amount, req.fee, nonce);
    tx.sign(&state.keys).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to sign transaction: {e}"),
        )
    })?;

    state
        .engine
        .submit_transaction(tx)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(StatusResponse {
        status: "Transaction added to mempool".to_string(),
    }))
}

/// GET /blockchain returns the full chain as a JSON array
pub async fn get_blockchain(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.engine.blocks())
}

/// GET /transaction?id= looks a transaction up in the pool or the chain
pub async fn get_transaction(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Transaction>, (StatusCode, String)> {
    let tx_id = params
        .get("id")
        .filter(|id| !id.is_empty())
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Transaction ID is required".to_string(),
        ))?;

    state
        .engine
        .find_transaction(tx_id)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Transaction not found".to_string()))
}
