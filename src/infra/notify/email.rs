//! Email fan-out leg (§4.8 step 5): logs the enqueue intent. Actual
//! delivery mechanics (templates, SMTP/provider integration) are out of
//! scope (§1) — this stands in for whatever queue/worker a host
//! application wires up.

use tracing::{info, instrument};

use crate::domain::Payment;

#[derive(Debug, Clone, Default)]
pub struct EmailEnqueuer;

impl EmailEnqueuer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, payment), fields(reference = %payment.reference))]
    pub async fn enqueue(&self, kind: &str, recipient: &str, payment: &Payment) {
        info!(kind, recipient, amount = %payment.amount, "email enqueued");
    }
}
