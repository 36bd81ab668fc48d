//! Fallback Path (§4.9, native path only): last resort for high-severity
//! native-path validation failures, gated behind an explicit opt-in
//! configuration flag (§9 "Fallback is advisory").

use solana_commitment_config::CommitmentConfig;
use tracing::{info, warn};

use crate::domain::{LedgerClient, LedgerTransaction, Payment, PaymentError};

/// Outcome of a Fallback Path invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The simplified check passed and `fallback_auto_confirm` is set:
    /// the caller should proceed to confirm using `signature`.
    Confirm { signature: String },
    /// Flagged for an operator to look at; the payment remains `pending`.
    ManualReviewRequired { reason: String },
}

/// Sums every positive balance delta across all accounts and compares it
/// to 50% of the expected amount (§4.9 step 2).
fn simplified_amount_check(tx: &LedgerTransaction, expected_base_units: u64) -> bool {
    let (Some(pre), Some(post)) = (&tx.pre_balances, &tx.post_balances) else {
        return false;
    };

    let total_positive_delta: u64 = pre
        .iter()
        .zip(post.iter())
        .map(|(pre, post)| post.saturating_sub(*pre))
        .sum();

    total_positive_delta.saturating_mul(2) >= expected_base_units
}

/// Invoked at most once per monitor cycle per payment (§4.9). Re-fetches at
/// `finalized` commitment; if that still can't decide, applies the
/// simplified 50%-delta check.
pub async fn run_fallback(
    ledger: &dyn LedgerClient,
    payment: &Payment,
    signature: &str,
    expected_base_units: u64,
    auto_confirm: bool,
) -> Result<FallbackOutcome, PaymentError> {
    let tx = ledger
        .get_transaction(signature, CommitmentConfig::finalized())
        .await?;

    let Some(tx) = tx else {
        info!(reference = %payment.reference, "fallback: transaction still not finalized");
        return Ok(FallbackOutcome::ManualReviewRequired {
            reason: "transaction not observed at finalized commitment".into(),
        });
    };

    if tx.err.is_some() {
        return Ok(FallbackOutcome::ManualReviewRequired {
            reason: "transaction carries an on-chain execution error".into(),
        });
    }

    if simplified_amount_check(&tx, expected_base_units) {
        if auto_confirm {
            info!(reference = %payment.reference, "fallback: simplified check passed, auto-confirming");
            return Ok(FallbackOutcome::Confirm {
                signature: signature.to_string(),
            });
        }
        warn!(
            reference = %payment.reference,
            "fallback: simplified check passed but fallback_auto_confirm is disabled, flagging for manual review"
        );
        return Ok(FallbackOutcome::ManualReviewRequired {
            reason: "simplified check passed; awaiting operator approval (fallback_auto_confirm disabled)".into(),
        });
    }

    Ok(FallbackOutcome::ManualReviewRequired {
        reason: "aggregate positive delta below 50% of expected amount".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountKeysSource;
    use crate::test_utils::mocks::MockLedgerClient;
    use solana_sdk::pubkey::Pubkey;

    fn tx(pre: Vec<u64>, post: Vec<u64>, err: Option<String>) -> LedgerTransaction {
        LedgerTransaction {
            signature: "sig".into(),
            account_keys: AccountKeysSource::Legacy(vec![Pubkey::new_unique()]),
            instructions: vec![],
            err,
            pre_balances: Some(pre),
            post_balances: Some(post),
        }
    }

    fn payment() -> Payment {
        Payment::new_native(
            Pubkey::new_unique(),
            "merchant-1".into(),
            "1.0".into(),
            Pubkey::new_unique(),
        )
    }

    #[tokio::test]
    async fn manual_review_when_transaction_not_found_at_finalized() {
        let ledger = MockLedgerClient::new();
        let outcome = run_fallback(&ledger, &payment(), "sig-missing", 1_000_000_000, false)
            .await
            .unwrap();
        assert!(matches!(outcome, FallbackOutcome::ManualReviewRequired { .. }));
    }

    #[tokio::test]
    async fn simplified_check_passes_but_not_auto_confirm_flags_manual_review() {
        let ledger = MockLedgerClient::new();
        ledger.set_transaction("sig", tx(vec![0], vec![600_000_000], None));

        let outcome = run_fallback(&ledger, &payment(), "sig", 1_000_000_000, false)
            .await
            .unwrap();
        assert!(matches!(outcome, FallbackOutcome::ManualReviewRequired { .. }));
    }

    #[tokio::test]
    async fn simplified_check_passes_and_auto_confirm_enabled_confirms() {
        let ledger = MockLedgerClient::new();
        ledger.set_transaction("sig", tx(vec![0], vec![600_000_000], None));

        let outcome = run_fallback(&ledger, &payment(), "sig", 1_000_000_000, true)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            FallbackOutcome::Confirm {
                signature: "sig".into()
            }
        );
    }

    #[tokio::test]
    async fn below_fifty_percent_is_manual_review_regardless_of_flag() {
        let ledger = MockLedgerClient::new();
        ledger.set_transaction("sig", tx(vec![0], vec![400_000_000], None));

        let outcome = run_fallback(&ledger, &payment(), "sig", 1_000_000_000, true)
            .await
            .unwrap();
        assert!(matches!(outcome, FallbackOutcome::ManualReviewRequired { .. }));
    }
}
