//! Shared application state (§5 "Shared resources"), built the way the
//! teacher's `AppState` composes its collaborators behind `Arc<dyn Trait>`
//! plus builder-pattern `with_*` methods.

use std::sync::Arc;

use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;

use crate::app::retry::{RetryPolicy, RetryTally};
use crate::config::MonitorConfig;
use crate::domain::{LedgerClient, Notifier, PaymentRepository};

/// Process-memory mapping from a reference to its live-UI subscriber set
/// (§3 "Notification Room"). Cleaned on session disconnect by the (out of
/// scope) live-client transport; the core only needs insert/remove/publish.
#[derive(Default)]
pub struct NotificationRoom {
    subscribers: DashMap<Pubkey, Vec<String>>,
}

impl NotificationRoom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, reference: Pubkey, session_id: impl Into<String>) {
        self.subscribers.entry(reference).or_default().push(session_id.into());
    }

    pub fn unsubscribe(&self, reference: &Pubkey, session_id: &str) {
        if let Some(mut sessions) = self.subscribers.get_mut(reference) {
            sessions.retain(|s| s != session_id);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, reference: &Pubkey) -> usize {
        self.subscribers
            .get(reference)
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }
}

/// Everything the Monitor Loop, Confirmer, and Fallback Path need, wired
/// once at start-up and shared across every `check_confirmation` task.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerClient>,
    pub repository: Arc<dyn PaymentRepository>,
    pub notifier: Arc<dyn Notifier>,
    pub tally: Arc<RetryTally>,
    pub notification_room: Arc<NotificationRoom>,
    pub retry_policy: RetryPolicy,
    pub config: MonitorConfig,
}

impl AppState {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        repository: Arc<dyn PaymentRepository>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        let retry_policy = RetryPolicy {
            base_secs: config.retry_base_secs,
            multiplier: config.retry_multiplier,
            cap_secs: config.retry_cap_secs,
            max_retries: config.retry_max_retries,
        };
        Self {
            ledger,
            repository,
            notifier,
            tally: Arc::new(RetryTally::new()),
            notification_room: Arc::new(NotificationRoom::new()),
            retry_policy,
            config,
        }
    }

    /// Swap in a shared tally (builder pattern, e.g. for tests that want to
    /// assert on tally state after a cycle).
    #[must_use]
    pub fn with_tally(mut self, tally: Arc<RetryTally>) -> Self {
        self.tally = tally;
        self
    }

    #[must_use]
    pub fn with_notification_room(mut self, room: Arc<NotificationRoom>) -> Self {
        self.notification_room = room;
        self
    }
}
