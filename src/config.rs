//! Process configuration, loaded the way the teacher's `main.rs::Config`
//! reads environment variables with sensible defaults.

use std::env;

use anyhow::{Context, Result};

/// Everything the Monitor Loop, Classifier, and RPC adapter need at
/// start-up (§[AMBIENT] 2).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub database_url: String,
    pub solana_rpc_url: String,
    pub webhook_url: Option<String>,

    /// §4.7: main cycle interval.
    pub poll_interval_secs: u64,
    /// §4.7: tally-sweep interval.
    pub tally_sweep_interval_secs: u64,
    /// §4.7: payments pulled per cycle.
    pub batch_size: i64,

    /// §4.6 retry defaults.
    pub retry_base_secs: u64,
    pub retry_multiplier: u32,
    pub retry_cap_secs: u64,
    pub retry_max_retries: u32,

    /// §5: per-RPC-call upper bound.
    pub rpc_timeout_secs: u64,

    /// §9 "Fallback is advisory": the simplified 50%-delta check never
    /// flips a payment to `confirmed` on its own unless this is `true`.
    pub fallback_auto_confirm: bool,
}

impl MonitorConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let solana_rpc_url = env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string());
        let webhook_url = env::var("WEBHOOK_URL").ok().filter(|s| !s.is_empty());

        let poll_interval_secs = env_parse("MONITOR_POLL_INTERVAL_SECS", 15);
        let tally_sweep_interval_secs = env_parse("MONITOR_TALLY_SWEEP_INTERVAL_SECS", 300);
        let batch_size = env_parse("MONITOR_BATCH_SIZE", 50);

        let retry_base_secs = env_parse("MONITOR_RETRY_BASE_SECS", 1);
        let retry_multiplier = env_parse("MONITOR_RETRY_MULTIPLIER", 2);
        let retry_cap_secs = env_parse("MONITOR_RETRY_CAP_SECS", 10);
        let retry_max_retries = env_parse("MONITOR_RETRY_MAX_RETRIES", 3);

        let rpc_timeout_secs = env_parse("MONITOR_RPC_TIMEOUT_SECS", 30);

        let fallback_auto_confirm = env::var("MONITOR_FALLBACK_AUTO_CONFIRM")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            database_url,
            solana_rpc_url,
            webhook_url,
            poll_interval_secs,
            tally_sweep_interval_secs,
            batch_size,
            retry_base_secs,
            retry_multiplier,
            retry_cap_secs,
            retry_max_retries,
            rpc_timeout_secs,
            fallback_auto_confirm,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
