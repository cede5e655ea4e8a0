//! Interactive operator menu
//!
//! Runs alongside the node and drives the engine directly: transaction
//! creation, mining, chain inspection, the contract/DID stubs and
//! consensus switching.

use crate::contract::{ContractEngine, Value};
use crate::core::blockchain::{Blockchain, Consensus};
use crate::did::DidRegistry;
use crate::network::message::Message;
use crate::network::node::Node;
use crate::wallet::Wallet;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Everything the menu needs to operate the node
pub struct CliContext {
    pub engine: Arc<Blockchain>,
    pub node: Node,
    pub wallet: Wallet,
    pub contracts: ContractEngine,
    pub dids: DidRegistry,
}

/// Run the menu loop until the operator exits
pub fn run_menu(ctx: CliContext) {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("1. Create Transaction");
        println!("2. Mine Block");
        println!("3. Print Blockchain");
        println!("4. Deploy Smart Contract");
        println!("5. Execute Smart Contract");
        println!("6. Register DID");
        println!("7. Authenticate DID");
        println!("8. Switch Consensus Algorithm");
        println!("9. Exit");
        print!("Enter choice: ");
        let _ = io::stdout().flush();

        let Some(Ok(line)) = lines.next() else { return };
        match line.trim() {
            "1" => create_transaction(&ctx, &mut lines),
            "2" => mine_block(&ctx),
            "3" => print_chain(&ctx),
            "4" => deploy_contract(&ctx, &mut lines),
            "5" => execute_contract(&ctx, &mut lines),
            "6" => register_did(&ctx),
            "7" => authenticate_did(&ctx, &mut lines),
            "8" => switch_consensus(&ctx, &mut lines),
            "9" => return,
            other => println!("Invalid choice: {other}"),
        }
    }
}

fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, label: &str) -> Option<String> {
    print!("{label}: ");
    let _ = io::stdout().flush();
    lines.next()?.ok().map(|l| l.trim().to_string())
}

fn prompt_u64(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    label: &str,
) -> Option<u64> {
    let raw = prompt(lines, label)?;
    match raw.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            println!("Not a number: {raw}");
            None
        }
    }
}

fn create_transaction(ctx: &CliContext, lines: &mut impl Iterator<Item = io::Result<String>>) {
    let Some(recipient) = prompt(lines, "Enter recipient") else { return };
    let Some(amount) = prompt_u64(lines, "Enter amount") else { return };
    let Some(fee) = prompt_u64(lines, "Enter fee") else { return };

    let nonce = ctx.engine.accounts.nonce(&ctx.wallet.address) + 1;
    let tx = match ctx.wallet.create_transaction(&recipient, amount, fee, nonce) {
        Ok(tx) => tx,
        Err(e) => {
            println!("Failed to sign transaction: {e}");
            return;
        }
    };

    match ctx.engine.submit_transaction(tx.clone()) {
        Ok(()) => {
            ctx.node.broadcast(Message::Transaction(tx));
            println!("Transaction created and added to the mempool.");
        }
        Err(e) => println!("Failed to add transaction to the mempool: {e}"),
    }
}

fn mine_block(ctx: &CliContext) {
    let candidates = ctx.engine.mempool.get_all();
    let result = match ctx.engine.consensus() {
        Consensus::ProofOfStake => ctx.engine.append_pos(candidates),
        Consensus::ProofOfWork => ctx.engine.append_pow(candidates),
    };

    match result {
        Ok(block) => {
            println!("Block {} mined: {}", block.index, block.hash);
            ctx.node.broadcast(Message::NewBlock(block));
        }
        Err(e) => println!("Failed to mine block: {e}"),
    }
}

fn print_chain(ctx: &CliContext) {
    for block in ctx.engine.blocks() {
        println!("Index: {}", block.index);
        println!("Timestamp: {}", block.timestamp);
        println!("Previous Hash: {}", block.previous_hash);
        println!("Hash: {}", block.hash);
        println!("Nonce: {}", block.nonce);
        println!("Difficulty: {}", block.difficulty);
        println!("Transactions: {}", block.transactions.len());
        for tx in &block.transactions {
            println!(
                "  {} -> {} amount {} fee {}",
                tx.sender, tx.recipient, tx.amount, tx.fee
            );
        }
        println!();
    }
}

fn deploy_contract(ctx: &CliContext, lines: &mut impl Iterator<Item = io::Result<String>>) {
    let Some(code) = prompt(lines, "Enter smart contract code") else { return };
    match ctx.contracts.deploy(&code, &ctx.wallet.address) {
        Ok(id) => println!("Smart contract deployed with ID: {id}"),
        Err(e) => println!("Failed to deploy smart contract: {e}"),
    }
}

fn execute_contract(ctx: &CliContext, lines: &mut impl Iterator<Item = io::Result<String>>) {
    let Some(id) = prompt(lines, "Enter smart contract ID") else { return };
    let Some(method) = prompt(lines, "Enter method name") else { return };
    let Some(arg) = prompt(lines, "Enter argument (blank for none)") else { return };

    let params = if arg.is_empty() {
        vec![]
    } else {
        vec![Value::Str(arg)]
    };
    match ctx.contracts.execute(&id, &method, params) {
        Ok(result) => println!("Smart contract executed. Result: {result:?}"),
        Err(e) => println!("Failed to execute smart contract: {e}"),
    }
}

fn register_did(ctx: &CliContext) {
    match ctx.dids.register(
        &ctx.wallet.address,
        &ctx.wallet.keys().public_key_hex(),
        HashMap::new(),
    ) {
        Ok(did) => println!("DID registered with ID: {did}"),
        Err(e) => println!("Failed to register DID: {e}"),
    }
}

fn authenticate_did(ctx: &CliContext, lines: &mut impl Iterator<Item = io::Result<String>>) {
    let Some(did) = prompt(lines, "Enter DID ID") else { return };
    let Some(message) = prompt(lines, "Enter message") else { return };

    let sig = match ctx.wallet.keys().sign(message.as_bytes()) {
        Ok(sig) => sig,
        Err(e) => {
            println!("Failed to sign challenge: {e}");
            return;
        }
    };

    match ctx.dids.authenticate(&did, &sig, &message) {
        Ok(true) => println!("DID authentication successful."),
        Ok(false) => println!("DID authentication failed."),
        Err(e) => println!("Failed to authenticate DID: {e}"),
    }
}

fn switch_consensus(ctx: &CliContext, lines: &mut impl Iterator<Item = io::Result<String>>) {
    println!("Available consensus algorithms: PoW, PoS");
    let Some(raw) = prompt(lines, "Enter the new consensus algorithm") else { return };
    match raw.parse::<Consensus>() {
        Ok(consensus) => {
            ctx.engine.set_consensus(consensus);
            println!("Switched to {consensus} consensus algorithm.");
        }
        Err(e) => println!("{e}"),
    }
}
