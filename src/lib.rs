//! Multi-tenant Solana payment monitor: watches pending payments to
//! confirmation, fans out notifications, and falls back to a simplified
//! check when primary validation can't reach a verdict.

pub mod app;
pub mod config;
pub mod consts;
pub mod construct;
pub mod domain;
pub mod infra;
pub mod locator;
pub mod validator;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
