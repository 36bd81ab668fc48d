//! Retry & Error Classifier (§4.6): bounded exponential backoff per
//! (payment, operation) pair, backed by a capacity-bounded, self-cleaning
//! tally.
//!
//! Grounded on the teacher's `calculate_backoff`/`MAX_RETRY_ATTEMPTS` shape
//! in `app/service.rs`, with the tally itself adapted from the
//! `DashMap`-backed `BlocklistManager` (`infra/blocklist/mod.rs`).

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, instrument, warn};

use crate::domain::PaymentError;

/// §4.6 defaults.
pub const DEFAULT_BASE_SECS: u64 = 1;
pub const DEFAULT_MULTIPLIER: u32 = 2;
pub const DEFAULT_CAP_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Entries beyond this count are purged wholesale on the next sweep tick
/// (§4.6: "oldest-or-all entries are purged").
const TALLY_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_secs: u64,
    pub multiplier: u32,
    pub cap_secs: u64,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_secs: DEFAULT_BASE_SECS,
            multiplier: DEFAULT_MULTIPLIER,
            cap_secs: DEFAULT_CAP_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

fn backoff_for(policy: &RetryPolicy, attempt: u32) -> Duration {
    let raw = policy.base_secs.saturating_mul(policy.multiplier.pow(attempt) as u64);
    Duration::from_secs(raw.min(policy.cap_secs))
}

/// Process-memory mapping from `(reference, operation_name)` to an attempt
/// count (§3 "Retry Tally"). Ephemeral by design; lost on restart is fine
/// because retries naturally resume on the next monitor tick.
#[derive(Default)]
pub struct RetryTally {
    counts: DashMap<(Pubkey, String), u32>,
}

impl RetryTally {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: DashMap::new(),
        }
    }

    fn get(&self, reference: &Pubkey, op_name: &str) -> u32 {
        self.counts
            .get(&(*reference, op_name.to_string()))
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    fn increment(&self, reference: &Pubkey, op_name: &str) -> u32 {
        let mut entry = self
            .counts
            .entry((*reference, op_name.to_string()))
            .or_insert(0);
        *entry += 1;
        *entry
    }

    fn clear(&self, reference: &Pubkey, op_name: &str) {
        self.counts.remove(&(*reference, op_name.to_string()));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The 5-minute tally-sweep ticker's action (§4.7). Purges wholesale
    /// once capacity is exceeded, matching §4.6's "acceptable because
    /// subsequent ticks re-establish state".
    pub fn sweep(&self) {
        if self.counts.len() > TALLY_CAPACITY {
            let purged = self.counts.len();
            self.counts.clear();
            warn!(purged, "retry tally exceeded capacity, purged wholesale");
        }
    }
}

/// Runs `op` through the Classifier's retry loop (§4.6). `op_name` keys the
/// tally alongside `reference`.
#[instrument(skip(op, tally), fields(reference = %reference, op_name))]
pub async fn execute_with_retry<T, F, Fut>(
    tally: &RetryTally,
    reference: &Pubkey,
    op_name: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, PaymentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PaymentError>>,
{
    loop {
        match op().await {
            Ok(value) => {
                let prior = tally.get(reference, op_name);
                if prior > 0 {
                    info!(op_name, prior_attempts = prior, "operation recovered after retries");
                }
                tally.clear(reference, op_name);
                return Ok(value);
            }
            Err(err) => {
                let severity = err.severity();
                let retryable = err.is_retryable();
                let attempt = tally.get(reference, op_name);

                warn!(
                    op_name,
                    error_kind = err.kind_str(),
                    severity = %severity,
                    is_retryable = retryable,
                    retry_attempt = attempt,
                    "operation failed"
                );

                if !retryable || attempt >= policy.max_retries {
                    return Err(err);
                }

                let next_attempt = tally.increment(reference, op_name);
                let delay = backoff_for(policy, next_attempt - 1);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_follows_base_multiplier_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(backoff_for(&policy, 0), Duration::from_secs(1));
        assert_eq!(backoff_for(&policy, 1), Duration::from_secs(2));
        assert_eq!(backoff_for(&policy, 2), Duration::from_secs(4));
        assert_eq!(backoff_for(&policy, 10), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn property6_retries_three_times_then_succeeds_on_fourth_call() {
        let tally = RetryTally::new();
        let reference = Pubkey::new_unique();
        let policy = RetryPolicy {
            base_secs: 0,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);

        let result = execute_with_retry(&tally, &reference, "locate", &policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(PaymentError::NetworkTimeout { timeout_secs: 30 })
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(tally.is_empty());
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits_immediately() {
        let tally = RetryTally::new();
        let reference = Pubkey::new_unique();
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), PaymentError> =
            execute_with_retry(&tally, &reference, "confirm", &policy, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PaymentError::AmountTooLow {
                    delta_base_units: 1,
                    expected_base_units: 2,
                    tolerance_base_units: 0,
                }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_max_retries_returns_last_error() {
        let tally = RetryTally::new();
        let reference = Pubkey::new_unique();
        let policy = RetryPolicy {
            base_secs: 0,
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), PaymentError> =
            execute_with_retry(&tally, &reference, "locate", &policy, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(PaymentError::NetworkTimeout { timeout_secs: 30 }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn sweep_clears_when_over_capacity() {
        let tally = RetryTally::new();
        for _ in 0..5 {
            tally.increment(&Pubkey::new_unique(), "op");
        }
        tally.sweep();
        assert_eq!(tally.len(), 5);
    }
}
