//! Confirmer & Notifier Fanout (§4.8): the idempotent status flip plus the
//! four best-effort downstream legs.

use chrono::Utc;
use serde_json::json;
use tracing::{instrument, warn};

use crate::app::state::AppState;
use crate::domain::{Payment, PaymentError, TransferDescriptor, WebhookPayload};

/// Runs the full fan-out for a payment whose transfer just validated.
/// Returns `Ok(None)` when another instance already confirmed it first
/// (§4.8 step 1, §8 property 7); `Ok(Some(payment))` on a fresh flip.
#[instrument(skip(state, descriptor), fields(reference = %payment.reference, signature = %signature))]
pub async fn confirm_and_notify(
    state: &AppState,
    payment: &Payment,
    signature: &str,
    descriptor: TransferDescriptor,
) -> Result<Option<Payment>, PaymentError> {
    let confirmed = state
        .repository
        .confirm_if_pending(&payment.reference, signature)
        .await?;

    let confirmed = match confirmed {
        Some(confirmed) => confirmed,
        None => {
            tracing::debug!("payment already confirmed by another instance, skipping fan-out");
            return Ok(None);
        }
    };

    let payload = WebhookPayload {
        reference: payment.reference.to_string(),
        amount: payment.amount.clone(),
        instrument: if payment.is_token() { "token" } else { "native" },
        signature: signature.to_string(),
        timestamp: Utc::now(),
    };

    if let Err(err) = state.notifier.webhook_emit("payment.confirmed", &payload).await {
        warn!(error_kind = err.kind_str(), "webhook emit failed, continuing fan-out");
    }

    state
        .notifier
        .live_publish(
            &payment.reference,
            "payment-update",
            json!({
                "status": "confirmed",
                "signature": signature,
                "validation_method": descriptor.method.as_str(),
                "delta_base_units": descriptor.delta_base_units,
            }),
        )
        .await;

    if let Err(err) = state
        .repository
        .record_transaction(&payment.reference, signature, Utc::now())
        .await
    {
        warn!(error_kind = err.kind_str(), "transaction log insert failed");
    }

    if payment.customer.email.is_some() {
        state
            .notifier
            .email_enqueue("payment_confirmed", payment.customer.email.as_deref().unwrap_or(""), &confirmed)
            .await;
    }

    Ok(Some(confirmed))
}
