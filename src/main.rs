//! nanochain node binary
//!
//! Starts the gossip node and the HTTP API per the selected mode, seeds
//! the genesis balance, then hands control to the interactive menu.

use clap::Parser;
use nanochain::api::{self, ApiState};
use nanochain::cli::{run_menu, CliContext};
use nanochain::contract::ContractEngine;
use nanochain::core::Blockchain;
use nanochain::did::DidRegistry;
use nanochain::network::Node;
use nanochain::wallet::Wallet;
use std::sync::Arc;

/// Initial balance minted to the node wallet at startup
const GENESIS_BALANCE: u64 = 100;

#[derive(Parser)]
#[command(name = "nanochain")]
#[command(version)]
#[command(about = "A compact proof-of-work/proof-of-stake blockchain node", long_about = None)]
struct Cli {
    /// Node listen address
    #[arg(long, default_value = "localhost:8080")]
    node: String,

    /// Comma-separated list of known peers
    #[arg(long, default_value = "")]
    peers: String,

    /// API server port
    #[arg(long, default_value = ":8081")]
    api: String,

    /// Node mode (full, light, api)
    #[arg(long, default_value = "full")]
    mode: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let wallet = match Wallet::new() {
        Ok(wallet) => wallet,
        Err(e) => {
            log::error!("Failed to generate node key pair: {e}");
            std::process::exit(1);
        }
    };

    let engine = Arc::new(Blockchain::new());
    engine.accounts.register(nanochain::core::Account::new(
        &wallet.address,
        0,
        &wallet.keys().public_key_hex(),
    ));
    engine.set_miner_address(&wallet.address);

    if let Err(e) = engine.seed_genesis_balance(&wallet.address, GENESIS_BALANCE) {
        log::error!("Failed to seed the genesis balance: {e}");
        std::process::exit(1);
    }
    log::info!(
        "Node address {} seeded with {GENESIS_BALANCE} coins",
        &wallet.address[..16]
    );

    let node = Node::new(&cli.node, engine.clone());

    let api_state = ApiState {
        engine: engine.clone(),
        keys: Arc::new(wallet.keys().clone()),
    };

    match cli.mode.as_str() {
        "full" => {
            let server = node.clone();
            tokio::spawn(async move {
                if let Err(e) = server.start().await {
                    log::error!("Node failed: {e}");
                }
            });
            let api_listen = cli.api.clone();
            tokio::spawn(async move {
                if let Err(e) = api::serve(api_state, &api_listen).await {
                    log::error!("API server failed: {e}");
                }
            });
        }
        "api" => {
            let api_listen = cli.api.clone();
            tokio::spawn(async move {
                if let Err(e) = api::serve(api_state, &api_listen).await {
                    log::error!("API server failed: {e}");
                }
            });
        }
        "light" => {
            println!("Light mode currently under development.");
        }
        other => {
            eprintln!("Invalid mode specified: {other}");
            std::process::exit(1);
        }
    }

    if !cli.peers.is_empty() {
        let peers: Vec<String> = cli
            .peers
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        node.discover_peers(&peers);
    }

    let ctx = CliContext {
        engine,
        node,
        wallet,
        contracts: ContractEngine::new(),
        dids: DidRegistry::new(),
    };

    // The menu blocks on stdin; keep the async runtime free
    let _ = tokio::task::spawn_blocking(move || run_menu(ctx)).await;
}
