//! HTTP surface over the chain engine
//!
//! A thin axum router: balances, transaction submission signed with the
//! node key, the chain snapshot and transaction lookup.

pub mod handlers;

pub use handlers::ApiState;

use axum::routing::{get, post};
use axum::Router;

/// Build the API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/balance", get(handlers::get_balance))
        .route("/send", post(handlers::send_transaction))
        .route("/blockchain", get(handlers::get_blockchain))
        .route("/transaction", get(handlers::get_transaction))
        .with_state(state)
}

/// Serve the API on the given port (`:8081` or `host:port`)
pub async fn serve(state: ApiState, listen: &str) -> Result<(), std::io::Error> {
    let addr = if listen.starts_with(':') {
        format!("0.0.0.0{listen}")
    } else {
        listen.to_string()
    };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("API server running on {addr}");
    axum::serve(listener, app).await
}
