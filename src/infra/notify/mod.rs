//! Concrete `Notifier` fan-out legs (§6 "Notifier collaborators").

pub mod email;
pub mod live;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

use crate::app::state::NotificationRoom;
use crate::domain::{Notifier, Payment, PaymentError, WebhookPayload};

pub use email::EmailEnqueuer;
pub use live::LivePublisher;
pub use webhook::WebhookSender;

/// Wires the three concrete legs together behind one `Notifier` impl,
/// matching how the teacher composes its collaborators one trait method
/// per concrete struct rather than one monolithic implementation.
pub struct CompositeNotifier {
    webhook: WebhookSender,
    live: LivePublisher,
    email: EmailEnqueuer,
}

impl CompositeNotifier {
    #[must_use]
    pub fn new(webhook_url: Option<String>, notification_room: Arc<NotificationRoom>) -> Self {
        Self {
            webhook: WebhookSender::new(webhook_url),
            live: LivePublisher::new(notification_room),
            email: EmailEnqueuer::new(),
        }
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn webhook_emit(&self, event: &str, payload: &WebhookPayload) -> Result<(), PaymentError> {
        self.webhook.send(event, payload).await
    }

    async fn live_publish(&self, reference: &Pubkey, event: &str, payload: Value) {
        self.live.publish(reference, event, payload).await;
    }

    async fn email_enqueue(&self, kind: &str, recipient: &str, payment: &Payment) {
        self.email.enqueue(kind, recipient, payment).await;
    }
}
