//! Drives the Locator → Validator → Confirmer pipeline against a
//! `SolanaLedgerClient` backed by a mocked JSON-RPC endpoint, routing each
//! RPC method to its own fixture the way a real validator would answer
//! `getSignaturesForAddress` and `getTransaction` differently.

use std::sync::Arc;

use payment_monitor::app::monitor::check_confirmation;
use payment_monitor::app::state::AppState;
use payment_monitor::config::MonitorConfig;
use payment_monitor::domain::Payment;
use payment_monitor::infra::blockchain::{RpcClientConfig, SolanaLedgerClient};
use payment_monitor::test_utils::mocks::{MockNotifier, MockPaymentRepository};
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

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
async fn full_pipeline_confirms_native_payment_against_mocked_rpc() {
    let recipient = Pubkey::new_unique();
    let reference = Pubkey::new_unique();
    let sender = Pubkey::new_unique();

    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "getSignaturesForAddress"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": [{"signature": "sig-live", "slot": 1, "err": null, "memo": null, "blockTime": null}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "getTransaction"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "transaction": {
                    "message": {
                        "accountKeys": [recipient.to_string(), sender.to_string(), reference.to_string()],
                        "instructions": [],
                        "addressTableLookups": [],
                    }
                },
                "meta": {
                    "err": null,
                    "preBalances": [1_000_000_000u64, 2_500_000_000u64, 0u64],
                    "postBalances": [2_500_000_000u64, 1_000_000_000u64, 0u64],
                    "loadedAddresses": null,
                },
                "version": "legacy",
            }
        })))
        .mount(&server)
        .await;

    let ledger = SolanaLedgerClient::new(server.uri(), RpcClientConfig::default()).unwrap();
    let repo = Arc::new(MockPaymentRepository::new());
    let payment = Payment::new_native(reference, "merchant-1".into(), "1.5".into(), recipient);
    repo.insert(payment.clone());

    let notifier = Arc::new(MockNotifier::new());
    let state = AppState::new(Arc::new(ledger), repo.clone(), notifier.clone(), config());

    let confirmed = check_confirmation(&state, &payment).await.unwrap();

    assert!(confirmed);
    assert_eq!(notifier.webhook_calls().len(), 1);
    let stored = repo.get(&reference).await.unwrap().unwrap();
    assert_eq!(stored.signature.as_deref(), Some("sig-live"));
}

#[tokio::test]
async fn reference_not_yet_observed_leaves_payment_pending() {
    let recipient = Pubkey::new_unique();
    let reference = Pubkey::new_unique();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "getSignaturesForAddress"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": []
        })))
        .mount(&server)
        .await;

    let ledger = SolanaLedgerClient::new(server.uri(), RpcClientConfig::default()).unwrap();
    let repo = Arc::new(MockPaymentRepository::new());
    let payment = Payment::new_native(reference, "merchant-1".into(), "2.0".into(), recipient);
    repo.insert(payment.clone());

    let notifier = Arc::new(MockNotifier::new());
    let state = AppState::new(Arc::new(ledger), repo, notifier.clone(), config());

    let confirmed = check_confirmation(&state, &payment).await.unwrap();

    assert!(!confirmed);
    assert!(notifier.webhook_calls().is_empty());
}
