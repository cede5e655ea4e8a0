//! Wallet management

pub mod wallet;

pub use wallet::{Wallet, WalletError};
