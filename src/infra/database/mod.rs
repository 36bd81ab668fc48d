pub mod postgres;

pub use postgres::{PostgresConfig, PostgresPaymentRepository};
