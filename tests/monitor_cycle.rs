//! End-to-end monitor cycle tests driving `run_cycle` across a mixed batch
//! of pending payments against the in-memory test collaborators.

use std::sync::Arc;

use payment_monitor::app::monitor::run_cycle;
use payment_monitor::app::state::AppState;
use payment_monitor::config::MonitorConfig;
use payment_monitor::domain::{AccountKeysSource, LedgerTransaction, Payment, PaymentStatus};
use payment_monitor::test_utils::mocks::{MockLedgerClient, MockNotifier, MockPaymentRepository};
use solana_sdk::pubkey::Pubkey;

fn config() -> MonitorConfig {
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
        fallback_auto_confirm: false,
    }
}

#[tokio::test]
async fn cycle_confirms_ready_payments_and_leaves_unready_ones_pending() {
    let ready_recipient = Pubkey::new_unique();
    let ready_reference = Pubkey::new_unique();
    let ready_sender = Pubkey::new_unique();

    let unready_recipient = Pubkey::new_unique();
    let unready_reference = Pubkey::new_unique();

    let ledger = MockLedgerClient::new();
    ledger.set_reference_signature(ready_reference, "sig-ready");
    ledger.set_transaction(
        "sig-ready",
        LedgerTransaction {
            signature: "sig-ready".into(),
            account_keys: AccountKeysSource::Legacy(vec![ready_recipient, ready_sender, ready_reference]),
            instructions: vec![],
            err: None,
            pre_balances: Some(vec![1_000_000_000, 2_500_000_000, 0]),
            post_balances: Some(vec![2_500_000_000, 1_000_000_000, 0]),
        },
    );

    let repo = Arc::new(MockPaymentRepository::new());
    let ready_payment = Payment::new_native(ready_reference, "merchant-1".into(), "1.5".into(), ready_recipient);
    let unready_payment = Payment::new_native(unready_reference, "merchant-1".into(), "2.0".into(), unready_recipient);
    repo.insert(ready_payment.clone());
    repo.insert(unready_payment.clone());

    let notifier = Arc::new(MockNotifier::new());
    let state = AppState::new(Arc::new(ledger), repo.clone(), notifier.clone(), config());

    let distribution = run_cycle(&state).await;

    assert_eq!(distribution.native, 2);
    assert_eq!(distribution.confirmed, 1);
    assert_eq!(notifier.webhook_calls().len(), 1);

    let ready = repo.get(&ready_reference).await.unwrap().unwrap();
    assert_eq!(ready.status, PaymentStatus::Confirmed);

    let unready = repo.get(&unready_reference).await.unwrap().unwrap();
    assert_eq!(unready.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn cycle_is_idempotent_across_repeated_runs() {
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
    repo.insert(payment);

    let notifier = Arc::new(MockNotifier::new());
    let state = AppState::new(Arc::new(ledger), repo.clone(), notifier.clone(), config());

    let first = run_cycle(&state).await;
    let second = run_cycle(&state).await;

    assert_eq!(first.confirmed, 1);
    assert_eq!(second.confirmed, 0);
    assert_eq!(notifier.webhook_calls().len(), 1);
}

#[tokio::test]
async fn repository_outage_yields_empty_cycle_without_panicking() {
    use payment_monitor::test_utils::mocks::MockConfig;

    let ledger = Arc::new(MockLedgerClient::new());
    let repo = Arc::new(MockPaymentRepository::with_config(MockConfig::failure("connection refused")));
    let notifier = Arc::new(MockNotifier::new());
    let state = AppState::new(ledger, repo, notifier, config());

    let distribution = run_cycle(&state).await;

    assert_eq!(distribution.native, 0);
    assert_eq!(distribution.token, 0);
    assert_eq!(distribution.confirmed, 0);
}
