//! Infrastructure layer implementations.

pub mod blockchain;
pub mod database;
pub mod notify;

pub use blockchain::{RpcClientConfig, SolanaLedgerClient};
pub use database::{PostgresConfig, PostgresPaymentRepository};
pub use notify::CompositeNotifier;
