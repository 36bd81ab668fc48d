//! Reference Locator (§4.2): resolves a pending payment to a candidate
//! signature, or reports that none has appeared yet.

use solana_commitment_config::CommitmentConfig;
use tracing::debug;

use crate::domain::{LedgerClient, Payment, PaymentError, ReferenceLookup};

/// Either the chain already has a matching transaction, or it doesn't.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateResult {
    Signature(String),
    NotYetPresent,
}

/// Looks up `payment.reference` against the ledger. A "reference never
/// observed" response is not an error — it's the expected steady state for
/// a payment still awaiting its on-chain transaction, so it's debug-logged
/// rather than surfaced to the Classifier.
pub async fn locate(
    ledger: &dyn LedgerClient,
    payment: &Payment,
) -> Result<LocateResult, PaymentError> {
    match ledger
        .find_by_reference(&payment.reference, CommitmentConfig::confirmed())
        .await?
    {
        ReferenceLookup::Found { signature } => Ok(LocateResult::Signature(signature)),
        ReferenceLookup::NotFound => {
            debug!(reference = %payment.reference, "reference not yet observed on-chain");
            Ok(LocateResult::NotYetPresent)
        }
    }
}
