//! Mock implementations for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

use crate::domain::{
    LedgerClient, LedgerTransaction, Notifier, Payment, PaymentError, PaymentRepository,
    PaymentStatus, ReferenceLookup, TokenTransferExpectation, WebhookPayload,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

/// Mock ledger client. `find_by_reference` answers from a settable table;
/// `validate_transfer` succeeds unless a one-shot failure was queued.
pub struct MockLedgerClient {
    references: Mutex<HashMap<Pubkey, String>>,
    transactions: Mutex<HashMap<String, LedgerTransaction>>,
    next_validate_failure: Mutex<Option<PaymentError>>,
    balances: Mutex<HashMap<Pubkey, u64>>,
    latest_blockhash: Mutex<(String, u64)>,
    config: MockConfig,
}

impl MockLedgerClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            references: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            next_validate_failure: Mutex::new(None),
            balances: Mutex::new(HashMap::new()),
            latest_blockhash: Mutex::new(("mock_blockhash".to_string(), 1)),
            config,
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_reference_signature(&self, reference: Pubkey, signature: impl Into<String>) {
        self.references
            .lock()
            .unwrap()
            .insert(reference, signature.into());
    }

    pub fn set_transaction(&self, signature: impl Into<String>, tx: LedgerTransaction) {
        self.transactions.lock().unwrap().insert(signature.into(), tx);
    }

    pub fn set_balance(&self, pubkey: Pubkey, lamports: u64) {
        self.balances.lock().unwrap().insert(pubkey, lamports);
    }

    /// Queues a single `validate_transfer` failure for the next call only.
    pub fn fail_next_validate(&self, error: PaymentError) {
        *self.next_validate_failure.lock().unwrap() = Some(error);
    }

    fn check_should_fail(&self) -> Result<(), PaymentError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "mock ledger failure".to_string());
            return Err(PaymentError::RpcConnectionFailed { message: msg });
        }
        Ok(())
    }
}

impl Default for MockLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn find_by_reference(
        &self,
        reference: &Pubkey,
        _commitment: CommitmentConfig,
    ) -> Result<ReferenceLookup, PaymentError> {
        self.check_should_fail()?;
        let references = self.references.lock().unwrap();
        Ok(match references.get(reference) {
            Some(signature) => ReferenceLookup::Found {
                signature: signature.clone(),
            },
            None => ReferenceLookup::NotFound,
        })
    }

    async fn get_transaction(
        &self,
        signature: &str,
        _commitment: CommitmentConfig,
    ) -> Result<Option<LedgerTransaction>, PaymentError> {
        self.check_should_fail()?;
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }

    async fn validate_transfer(
        &self,
        _signature: &str,
        _expectation: TokenTransferExpectation<'_>,
    ) -> Result<(), PaymentError> {
        self.check_should_fail()?;
        if let Some(err) = self.next_validate_failure.lock().unwrap().take() {
            return Err(err);
        }
        Ok(())
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, PaymentError> {
        self.check_should_fail()?;
        Ok(*self.balances.lock().unwrap().get(pubkey).unwrap_or(&0))
    }

    async fn get_latest_blockhash(&self) -> Result<(String, u64), PaymentError> {
        self.check_should_fail()?;
        Ok(self.latest_blockhash.lock().unwrap().clone())
    }
}

/// Mock payment repository backed by an in-memory map, keyed on reference.
pub struct MockPaymentRepository {
    storage: Mutex<HashMap<Pubkey, Payment>>,
    recorded_transactions: Mutex<Vec<(Pubkey, String)>>,
    config: MockConfig,
}

impl MockPaymentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            storage: Mutex::new(HashMap::new()),
            recorded_transactions: Mutex::new(Vec::new()),
            config,
        }
    }

    pub fn insert(&self, payment: Payment) {
        self.storage.lock().unwrap().insert(payment.reference, payment);
    }

    #[must_use]
    pub fn recorded_transactions(&self) -> Vec<(Pubkey, String)> {
        self.recorded_transactions.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), PaymentError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "mock repository failure".to_string());
            return Err(PaymentError::DatabaseError { message: msg });
        }
        Ok(())
    }
}

impl Default for MockPaymentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentRepository for MockPaymentRepository {
    async fn list_pending(&self, limit: i64) -> Result<Vec<Payment>, PaymentError> {
        self.check_should_fail()?;
        let storage = self.storage.lock().unwrap();
        let mut items: Vec<Payment> = storage
            .values()
            .filter(|p| p.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items.into_iter().take(limit.max(0) as usize).collect())
    }

    async fn confirm_if_pending(
        &self,
        reference: &Pubkey,
        signature: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        self.check_should_fail()?;
        let mut storage = self.storage.lock().unwrap();
        match storage.get_mut(reference) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = PaymentStatus::Confirmed;
                payment.signature = Some(signature.to_string());
                payment.updated_at = Utc::now();
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_failed(&self, reference: &Pubkey) -> Result<Payment, PaymentError> {
        self.check_should_fail()?;
        let mut storage = self.storage.lock().unwrap();
        let payment = storage
            .get_mut(reference)
            .ok_or(PaymentError::ReferenceNotFound)?;
        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn get(&self, reference: &Pubkey) -> Result<Option<Payment>, PaymentError> {
        self.check_should_fail()?;
        Ok(self.storage.lock().unwrap().get(reference).cloned())
    }

    async fn record_transaction(
        &self,
        reference: &Pubkey,
        signature: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        self.check_should_fail()?;
        self.recorded_transactions
            .lock()
            .unwrap()
            .push((*reference, signature.to_string()));
        Ok(())
    }
}

/// Mock notifier recording every fan-out leg invoked, for assertion in
/// Confirmer tests.
pub struct MockNotifier {
    webhooks: Mutex<Vec<(String, WebhookPayload)>>,
    live_events: Mutex<Vec<(Pubkey, String, Value)>>,
    emails: Mutex<Vec<(String, String)>>,
    config: MockConfig,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            webhooks: Mutex::new(Vec::new()),
            live_events: Mutex::new(Vec::new()),
            emails: Mutex::new(Vec::new()),
            config,
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    #[must_use]
    pub fn webhook_calls(&self) -> Vec<(String, WebhookPayload)> {
        self.webhooks.lock().unwrap().clone()
    }

    #[must_use]
    pub fn live_publish_calls(&self) -> usize {
        self.live_events.lock().unwrap().len()
    }

    #[must_use]
    pub fn email_calls(&self) -> Vec<(String, String)> {
        self.emails.lock().unwrap().clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn webhook_emit(&self, event: &str, payload: &WebhookPayload) -> Result<(), PaymentError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "mock notifier failure".to_string());
            return Err(PaymentError::ExternalNotifierFailed { message: msg });
        }
        self.webhooks
            .lock()
            .unwrap()
            .push((event.to_string(), payload.clone()));
        Ok(())
    }

    async fn live_publish(&self, reference: &Pubkey, event: &str, payload: Value) {
        self.live_events
            .lock()
            .unwrap()
            .push((*reference, event.to_string(), payload));
    }

    async fn email_enqueue(&self, kind: &str, recipient: &str, _payment: &Payment) {
        self.emails
            .lock()
            .unwrap()
            .push((kind.to_string(), recipient.to_string()));
    }
}
