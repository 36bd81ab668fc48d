//! Live-update fan-out leg (§4.8 step 3): publishes to whatever session
//! transport owns the Notification Room's subscriber set. The transport
//! itself (websocket/SSE) is out of scope (§1); this leg only needs to
//! know how many subscribers would have received the event, which it
//! gets from `NotificationRoom`.

use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::app::state::NotificationRoom;

pub struct LivePublisher {
    room: Arc<NotificationRoom>,
}

impl LivePublisher {
    #[must_use]
    pub fn new(room: Arc<NotificationRoom>) -> Self {
        Self { room }
    }

    #[instrument(skip(self, payload))]
    pub async fn publish(&self, reference: &Pubkey, event: &str, payload: Value) {
        let subscribers = self.room.subscriber_count(reference);
        debug!(subscribers, event, %payload, "live event published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_does_not_panic_with_zero_subscribers() {
        let room = Arc::new(NotificationRoom::new());
        let publisher = LivePublisher::new(room);
        publisher
            .publish(&Pubkey::new_unique(), "payment-update", serde_json::json!({"status": "confirmed"}))
            .await;
    }

    #[tokio::test]
    async fn publish_observes_subscriber_count() {
        let room = Arc::new(NotificationRoom::new());
        let reference = Pubkey::new_unique();
        room.subscribe(reference, "session-a");
        let publisher = LivePublisher::new(Arc::clone(&room));
        publisher
            .publish(&reference, "payment-update", serde_json::json!({}))
            .await;
        assert_eq!(room.subscriber_count(&reference), 1);
    }
}
