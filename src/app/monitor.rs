//! Monitor Loop (§4.7): the periodic scheduler that drives each pending
//! payment through Locator → Validator → Confirmer, with the Fallback Path
//! as a last resort on the native side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use solana_commitment_config::CommitmentConfig;
use tracing::{info, instrument, warn};

use crate::app::confirmer::confirm_and_notify;
use crate::app::fallback::{run_fallback, FallbackOutcome};
use crate::app::retry::execute_with_retry;
use crate::app::state::AppState;
use crate::domain::{CycleDistribution, Payment, PaymentError, PaymentKind};
use crate::locator::{locate, LocateResult};
use crate::validator::{validate_native_transfer, validate_token_transfer};

/// Lifecycle states for the Monitor (§4.7 "State machine"). `Stopped` is
/// the sole initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Coarse start/stop switch consulted at each suspension point so a `Stop`
/// takes effect at the next I/O boundary rather than synchronously
/// interrupting in-flight work (§5 "Cancellation & shutdown").
pub struct MonitorHandle {
    running: AtomicBool,
}

impl MonitorHandle {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
        })
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn state(&self) -> MonitorState {
        if self.running.load(Ordering::SeqCst) {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }
}

impl Default for MonitorHandle {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }
}

/// Scales a decimal SOL-denominated amount string into lamports without
/// going through binary floating point (§3 "amount is an arbitrary-precision
/// decimal string").
fn parse_amount_base_units(amount: &str) -> Result<u64, PaymentError> {
    use rust_decimal::prelude::ToPrimitive;

    let decimal: Decimal = amount.parse().map_err(|_| PaymentError::ValidationException {
        message: format!("malformed amount string: {amount}"),
    })?;
    let lamports = decimal
        .round_dp(9)
        .checked_mul(Decimal::from(1_000_000_000u64))
        .ok_or_else(|| PaymentError::ValidationException {
            message: format!("amount overflows lamport scaling: {amount}"),
        })?;
    lamports.to_u64().ok_or_else(|| PaymentError::ValidationException {
        message: format!("amount out of range: {amount}"),
    })
}

/// A single cycle body: pulls the batch and runs every payment through
/// `check_confirmation` sequentially (§4.7, §5).
#[instrument(skip(state))]
pub async fn run_cycle(state: &AppState) -> CycleDistribution {
    let mut distribution = CycleDistribution::default();

    let pending = match state.repository.list_pending(state.config.batch_size).await {
        Ok(payments) => payments,
        Err(err) => {
            warn!(error_kind = err.kind_str(), "failed to list pending payments");
            return distribution;
        }
    };

    for payment in &pending {
        match payment.kind {
            PaymentKind::Native => distribution.native += 1,
            PaymentKind::Token => distribution.token += 1,
        }

        match check_confirmation(state, payment).await {
            Ok(true) => distribution.confirmed += 1,
            Ok(false) => {}
            Err(err) if err.is_retryable() => distribution.retryable_failures += 1,
            Err(err) => {
                if err.is_fallback_eligible() && matches!(payment.kind, PaymentKind::Native) {
                    distribution.fallbacks_invoked += 1;
                }
                distribution.terminal_failures += 1;
            }
        }
    }

    info!(
        native = distribution.native,
        token = distribution.token,
        confirmed = distribution.confirmed,
        retryable_failures = distribution.retryable_failures,
        terminal_failures = distribution.terminal_failures,
        fallbacks_invoked = distribution.fallbacks_invoked,
        "monitor cycle complete"
    );

    distribution
}

/// Idempotent per-payment pipeline: Locator → Validator → Confirmer (and
/// Fallback for eligible native failures). Returns `Ok(true)` iff this
/// invocation performed the confirming flip.
#[instrument(skip(state), fields(reference = %payment.reference))]
pub async fn check_confirmation(state: &AppState, payment: &Payment) -> Result<bool, PaymentError> {
    let signature = match execute_with_retry(&state.tally, &payment.reference, "locate", &state.retry_policy, || {
        locate(state.ledger.as_ref(), payment)
    })
    .await?
    {
        LocateResult::Signature(signature) => signature,
        LocateResult::NotYetPresent => return Ok(false),
    };

    let expected_base_units = parse_amount_base_units(&payment.amount)?;

    let validation_result = match payment.kind {
        PaymentKind::Native => {
            let tx = execute_with_retry(&state.tally, &payment.reference, "fetch_transaction", &state.retry_policy, || {
                let signature = signature.clone();
                async move {
                    state
                        .ledger
                        .get_transaction(&signature, CommitmentConfig::confirmed())
                        .await?
                        .ok_or(PaymentError::TransactionNotFound)
                }
            })
            .await?;

            validate_native_transfer(&tx, &payment.recipient, &payment.reference, expected_base_units)
        }
        PaymentKind::Token => {
            let token_mint = payment
                .token_mint
                .ok_or_else(|| PaymentError::ValidationException {
                    message: "token payment missing token_mint".into(),
                })?;
            execute_with_retry(&state.tally, &payment.reference, "validate_token", &state.retry_policy, || {
                let signature = signature.clone();
                async move {
                    validate_token_transfer(
                        state.ledger.as_ref(),
                        &signature,
                        &payment.recipient,
                        &payment.amount,
                        &token_mint,
                        &payment.reference,
                    )
                    .await
                    .map(|()| crate::domain::TransferDescriptor {
                        method: crate::domain::ValidationMethod::AccountBased,
                        expected_base_units,
                        tolerance_base_units: 0,
                        delta_base_units: expected_base_units,
                    })
                }
            })
            .await
        }
    };

    match validation_result {
        Ok(descriptor) => {
            let confirmed = confirm_and_notify(state, payment, &signature, descriptor).await?;
            Ok(confirmed.is_some())
        }
        Err(err) if matches!(payment.kind, PaymentKind::Native) && err.is_fallback_eligible() => {
            match run_fallback(
                state.ledger.as_ref(),
                payment,
                &signature,
                expected_base_units,
                state.config.fallback_auto_confirm,
            )
            .await?
            {
                FallbackOutcome::Confirm { signature } => {
                    let descriptor = crate::domain::TransferDescriptor {
                        method: crate::domain::ValidationMethod::AccountBased,
                        expected_base_units,
                        tolerance_base_units: 0,
                        delta_base_units: expected_base_units,
                    };
                    let confirmed = confirm_and_notify(state, payment, &signature, descriptor).await?;
                    Ok(confirmed.is_some())
                }
                FallbackOutcome::ManualReviewRequired { reason } => {
                    warn!(reference = %payment.reference, reason, "manual review required");
                    Err(err)
                }
            }
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::domain::{AccountKeysSource, LedgerTransaction};
    use crate::test_utils::mocks::{MockLedgerClient, MockNotifier, MockPaymentRepository};

    fn test_config(fallback_auto_confirm: bool) -> MonitorConfig {
        MonitorConfig {
            database_url: "postgres://localhost/test".into(),
            solana_rpc_url: "http://localhost".into(),
            webhook_url: None,
            poll_interval_secs: 15,
            tally_sweep_interval_secs: 300,
            batch_size: 50,
            retry_base_secs: 0,
            retry_multiplier: 2,
            retry_cap_secs: 1,
            retry_max_retries: 3,
            rpc_timeout_secs: 30,
            fallback_auto_confirm,
        }
    }

    #[tokio::test]
    async fn s1_native_happy_path_end_to_end() {
        let recipient = Pubkey::new_unique();
        let reference = Pubkey::new_unique();
        let sender = Pubkey::new_unique();

        let ledger = MockLedgerClient::new();
        ledger.set_reference_signature(reference, "sig-1");
        ledger.set_transaction(
            "sig-1",
            LedgerTransaction {
                signature: "sig-1".into(),
                account_keys: AccountKeysSource::Legacy(vec![recipient, sender, reference]),
                instructions: vec![],
                err: None,
                pre_balances: Some(vec![1_000_000_000, 2_500_000_000, 0]),
                post_balances: Some(vec![2_500_000_000, 1_000_000_000, 0]),
            },
        );

        let repo = Arc::new(MockPaymentRepository::new());
        let payment = Payment::new_native(reference, "merchant-1".into(), "1.5".into(), recipient);
        repo.insert(payment.clone());

        let notifier = Arc::new(MockNotifier::new());
        let state = AppState::new(Arc::new(ledger), repo.clone(), notifier.clone(), test_config(false));

        let confirmed = check_confirmation(&state, &payment).await.unwrap();
        assert!(confirmed);
        assert_eq!(notifier.webhook_calls().len(), 1);
    }

    #[tokio::test]
    async fn not_yet_present_leaves_payment_pending_without_error() {
        let reference = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let ledger = MockLedgerClient::new();
        let repo = Arc::new(MockPaymentRepository::new());
        let payment = Payment::new_native(reference, "merchant-1".into(), "1.0".into(), recipient);
        repo.insert(payment.clone());

        let notifier = Arc::new(MockNotifier::new());
        let state = AppState::new(Arc::new(ledger), repo, notifier, test_config(false));

        let confirmed = check_confirmation(&state, &payment).await.unwrap();
        assert!(!confirmed);
    }

    #[tokio::test]
    async fn s3_underpayment_falls_through_to_fallback_manual_review() {
        let recipient = Pubkey::new_unique();
        let reference = Pubkey::new_unique();
        let sender = Pubkey::new_unique();

        let ledger = MockLedgerClient::new();
        ledger.set_reference_signature(reference, "sig-1");
        let underpaid_tx = LedgerTransaction {
            signature: "sig-1".into(),
            account_keys: AccountKeysSource::Legacy(vec![recipient, sender, reference]),
            instructions: vec![],
            err: None,
            pre_balances: Some(vec![1_000_000_000, 2_500_000_000, 0]),
            post_balances: Some(vec![2_400_000_000, 1_100_000_000, 0]),
        };
        ledger.set_transaction("sig-1", underpaid_tx);

        let repo = Arc::new(MockPaymentRepository::new());
        let payment = Payment::new_native(reference, "merchant-1".into(), "1.5".into(), recipient);
        repo.insert(payment.clone());

        let notifier = Arc::new(MockNotifier::new());
        let state = AppState::new(Arc::new(ledger), repo, notifier, test_config(false));

        let err = check_confirmation(&state, &payment).await.unwrap_err();
        assert!(matches!(err, PaymentError::AmountTooLow { .. }));
    }

    #[tokio::test]
    async fn s5_token_happy_path_end_to_end() {
        let recipient = Pubkey::new_unique();
        let reference = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ledger = MockLedgerClient::new();
        ledger.set_reference_signature(reference, "sig-1");

        let repo = Arc::new(MockPaymentRepository::new());
        let payment = Payment::new_token(reference, "merchant-1".into(), "100".into(), recipient, mint);
        repo.insert(payment.clone());

        let notifier = Arc::new(MockNotifier::new());
        let state = AppState::new(Arc::new(ledger), repo, notifier.clone(), test_config(false));

        let confirmed = check_confirmation(&state, &payment).await.unwrap();
        assert!(confirmed);
        assert_eq!(notifier.webhook_calls().len(), 1);
    }

    #[test]
    fn monitor_handle_starts_stopped() {
        let handle = MonitorHandle::new();
        assert_eq!(handle.state(), MonitorState::Stopped);
        handle.start();
        assert_eq!(handle.state(), MonitorState::Running);
        handle.stop();
        assert_eq!(handle.state(), MonitorState::Stopped);
    }
}
