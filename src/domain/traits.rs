//! Contracts for the external collaborators the core Monitor consumes (§6).
//!
//! Kept deliberately small and injected as `Arc<dyn Trait>` so the test
//! suite can substitute fakes without process-wide mutable state (§9,
//! "Singletons → injected dependencies").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

use super::error::PaymentError;
use super::types::Payment;

/// Result of `find_by_reference`: either the chain has a matching signature,
/// or it doesn't yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceLookup {
    Found { signature: String },
    NotFound,
}

/// How a transaction's account keys were reported by the ledger (§6, §9
/// "Versioned vs. legacy transactions"). Kept as a sum type so the one
/// extraction function that understands both shapes — and both failure
/// modes — stays colocated in the Validator rather than bleeding the
/// ledger's binary format elsewhere in the core.
#[derive(Debug, Clone)]
pub enum AccountKeysSource {
    /// `message.version == "legacy"`: the account-keys list is direct.
    Legacy(Vec<Pubkey>),
    /// `message.version >= 0`: static keys plus, if lookup-table resolution
    /// succeeded, the resolved lookup-table entries appended. `None` means
    /// the message's key-resolution operation failed.
    Versioned {
        static_keys: Vec<Pubkey>,
        resolved_lookup_keys: Option<Vec<Pubkey>>,
    },
}

/// The subset of an on-chain transaction the Validator needs (§6's
/// "Transaction object schema").
#[derive(Debug, Clone)]
pub struct LedgerTransaction {
    pub signature: String,
    pub account_keys: AccountKeysSource,
    pub instructions: Vec<LedgerInstruction>,
    pub err: Option<String>,
    pub pre_balances: Option<Vec<u64>>,
    pub post_balances: Option<Vec<u64>>,
}

#[derive(Debug, Clone)]
pub struct LedgerInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

/// Parameters for the token path's `validate_transfer` delegation (§4.4/§6).
#[derive(Debug, Clone)]
pub struct TokenTransferExpectation<'a> {
    pub recipient: &'a Pubkey,
    pub amount: &'a str,
    pub token_mint: &'a Pubkey,
    pub reference: &'a Pubkey,
    pub commitment: CommitmentConfig,
}

/// Thin capability surface over a specific ledger RPC (§6 "Ledger-client
/// capability"). Implementations wrap e.g. Solana JSON-RPC.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn find_by_reference(
        &self,
        reference: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<ReferenceLookup, PaymentError>;

    async fn get_transaction(
        &self,
        signature: &str,
        commitment: CommitmentConfig,
    ) -> Result<Option<LedgerTransaction>, PaymentError>;

    /// Canonical token-path verification, delegated to wholesale (§4.4).
    async fn validate_transfer(
        &self,
        signature: &str,
        expectation: TokenTransferExpectation<'_>,
    ) -> Result<(), PaymentError>;

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, PaymentError>;

    async fn get_latest_blockhash(&self) -> Result<(String, u64), PaymentError>;
}

/// The repository operations the Monitor invokes (§6 "Payment repository").
/// The storage engine itself is out of scope; only this surface is defined.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn list_pending(&self, limit: i64) -> Result<Vec<Payment>, PaymentError>;

    /// The sole concurrency primitive for the confirm step (§4.8, §5):
    /// keyed on `reference` AND current `status = pending`. Returns `None`
    /// ("NotPending") when no row matched, meaning another instance already
    /// confirmed it.
    async fn confirm_if_pending(
        &self,
        reference: &Pubkey,
        signature: &str,
    ) -> Result<Option<Payment>, PaymentError>;

    async fn mark_failed(&self, reference: &Pubkey) -> Result<Payment, PaymentError>;

    async fn get(&self, reference: &Pubkey) -> Result<Option<Payment>, PaymentError>;

    /// Record a confirmed transaction in the transactions log (§4.8 step 4).
    /// Duplicate insertion is tolerated.
    async fn record_transaction(
        &self,
        reference: &Pubkey,
        signature: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PaymentError>;
}

/// Webhook payload for `payment.confirmed` (§4.8 step 2).
#[derive(Debug, Clone, serde::Serialize)]
pub struct WebhookPayload {
    pub reference: String,
    pub amount: String,
    pub instrument: &'static str,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
}

/// Fire-and-forget downstream notification legs (§6 "Notifier
/// collaborators"). None of these propagate errors to the caller; the
/// Confirmer logs failures as warnings and continues the fan-out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn webhook_emit(&self, event: &str, payload: &WebhookPayload) -> Result<(), PaymentError>;

    async fn live_publish(&self, reference: &Pubkey, event: &str, payload: Value);

    /// Default no-op: email delivery mechanics are out of scope (§1); a
    /// concrete `Notifier` enqueues through whatever collaborator owns that.
    async fn email_enqueue(&self, kind: &str, recipient: &str, payment: &Payment) {
        let _ = (kind, recipient, payment);
    }
}
