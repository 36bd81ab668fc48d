//! Token validation path (§4.4): unlike the native path, the
//! ledger-client adapter owns the full decision since SPL/Token-2022
//! transfer verification needs mint-decimals lookup and ATA resolution
//! that only the adapter has cheap access to.

use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

use crate::domain::{LedgerClient, PaymentError, TokenTransferExpectation};

/// Delegates wholesale to the ledger client's `validate_transfer` (§4.4
/// step 1): recipient, amount, and mint must all match, at `confirmed`
/// commitment.
pub async fn validate_token_transfer(
    ledger: &dyn LedgerClient,
    signature: &str,
    recipient: &Pubkey,
    amount: &str,
    token_mint: &Pubkey,
    reference: &Pubkey,
) -> Result<(), PaymentError> {
    let expectation = TokenTransferExpectation {
        recipient,
        amount,
        token_mint,
        reference,
        commitment: CommitmentConfig::confirmed(),
    };
    ledger.validate_transfer(signature, expectation).await
}
