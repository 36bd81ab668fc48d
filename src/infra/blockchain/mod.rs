//! Blockchain client implementations: the Ledger Client Adapter (§6).

pub mod solana;

pub use solana::{RpcClientConfig, SolanaLedgerClient};
