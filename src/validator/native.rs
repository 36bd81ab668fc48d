//! Native-coin validation path (§4.3).

use solana_sdk::pubkey::Pubkey;

use crate::consts::{balance_tolerance, MEMO_PROGRAM_ID};
use crate::domain::{
    AccountKeysSource, LedgerTransaction, PaymentError, TransferDescriptor, ValidationMethod,
};

/// The single function that understands both legacy and versioned key
/// shapes (§9 "Versioned vs. legacy transactions"). Both branches and both
/// failure modes live here so the ledger's binary format doesn't bleed
/// further into the core.
pub fn extract_account_keys(source: &AccountKeysSource) -> Result<Vec<Pubkey>, PaymentError> {
    let keys = match source {
        AccountKeysSource::Legacy(keys) => keys.clone(),
        AccountKeysSource::Versioned {
            static_keys,
            resolved_lookup_keys,
        } => {
            let lookup_keys = resolved_lookup_keys.as_ref().ok_or_else(|| {
                PaymentError::AccountKeysError {
                    message: "versioned message key resolution failed".into(),
                }
            })?;
            let mut keys = static_keys.clone();
            keys.extend(lookup_keys.iter().copied());
            keys
        }
    };

    if keys.is_empty() {
        return Err(PaymentError::InvalidAccountKeys);
    }

    Ok(keys)
}

/// Scans instructions for a memo-program invocation whose decoded UTF-8
/// data contains `reference`'s canonical textual (base58) form (§4.3 step 4,
/// §8 property 5).
fn find_reference_in_memo(tx: &LedgerTransaction, reference: &Pubkey) -> bool {
    let reference_str = reference.to_string();
    tx.instructions.iter().any(|ix| {
        ix.program_id == MEMO_PROGRAM_ID
            && std::str::from_utf8(&ix.data)
                .map(|decoded| decoded.contains(&reference_str))
                .unwrap_or(false)
    })
}

/// Runs the native-coin path end to end (§4.3 steps 2-6). The transaction
/// must already have been fetched by the caller (Reference Locator hands
/// off a signature; the Monitor Loop fetches before calling in here).
pub fn validate_native_transfer(
    tx: &LedgerTransaction,
    recipient: &Pubkey,
    reference: &Pubkey,
    amount_base_units: u64,
) -> Result<TransferDescriptor, PaymentError> {
    if let Some(err) = &tx.err {
        return Err(PaymentError::TransactionFailed {
            message: err.clone(),
        });
    }

    let account_keys = extract_account_keys(&tx.account_keys)?;

    let method = if account_keys.contains(reference) {
        ValidationMethod::AccountBased
    } else if find_reference_in_memo(tx, reference) {
        ValidationMethod::MemoBased
    } else {
        return Err(PaymentError::ReferenceNotFound);
    };

    let recipient_idx = account_keys
        .iter()
        .position(|k| k == recipient)
        .ok_or(PaymentError::RecipientNotFound)?;

    let (pre, post) = match (&tx.pre_balances, &tx.post_balances) {
        (Some(pre), Some(post)) => (pre, post),
        _ => return Err(PaymentError::MissingBalanceMetadata),
    };

    let pre_balance = *pre.get(recipient_idx).ok_or(PaymentError::MissingBalanceMetadata)?;
    let post_balance = *post.get(recipient_idx).ok_or(PaymentError::MissingBalanceMetadata)?;

    let delta = post_balance.saturating_sub(pre_balance);
    let expected = amount_base_units;
    let tolerance = balance_tolerance(expected);
    let floor = expected.saturating_sub(tolerance);

    if delta < floor {
        return Err(PaymentError::AmountTooLow {
            delta_base_units: delta,
            expected_base_units: expected,
            tolerance_base_units: tolerance,
        });
    }

    Ok(TransferDescriptor {
        method,
        expected_base_units: expected,
        tolerance_base_units: tolerance,
        delta_base_units: delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LedgerInstruction;

    fn tx_with(
        account_keys: AccountKeysSource,
        pre: Vec<u64>,
        post: Vec<u64>,
        instructions: Vec<LedgerInstruction>,
    ) -> LedgerTransaction {
        LedgerTransaction {
            signature: "sig".into(),
            account_keys,
            instructions,
            err: None,
            pre_balances: Some(pre),
            post_balances: Some(post),
        }
    }

    #[test]
    fn s1_native_happy_path() {
        let r = Pubkey::new_unique();
        let s = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let tx = tx_with(
            AccountKeysSource::Legacy(vec![r, s, k]),
            vec![1_000_000_000, 2_500_000_000, 0],
            vec![2_500_000_000, 1_000_000_000, 0],
            vec![],
        );
        let descriptor = validate_native_transfer(&tx, &r, &k, 1_500_000_000).unwrap();
        assert_eq!(descriptor.method, ValidationMethod::AccountBased);
        assert_eq!(descriptor.delta_base_units, 1_500_000_000);
    }

    #[test]
    fn s2_priority_fee_within_tolerance() {
        let r = Pubkey::new_unique();
        let s = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let tx = tx_with(
            AccountKeysSource::Legacy(vec![r, s, k]),
            vec![1_000_000_000, 2_500_000_000, 0],
            vec![2_499_995_000, 1_000_005_000, 0],
            vec![],
        );
        let descriptor = validate_native_transfer(&tx, &r, &k, 1_500_000_000).unwrap();
        assert_eq!(descriptor.delta_base_units, 1_499_995_000);
    }

    #[test]
    fn s3_underpayment_fails() {
        let r = Pubkey::new_unique();
        let s = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let tx = tx_with(
            AccountKeysSource::Legacy(vec![r, s, k]),
            vec![1_000_000_000, 2_500_000_000, 0],
            vec![2_400_000_000, 1_100_000_000, 0],
            vec![],
        );
        let err = validate_native_transfer(&tx, &r, &k, 1_500_000_000).unwrap_err();
        assert!(matches!(err, PaymentError::AmountTooLow { .. }));
    }

    #[test]
    fn s4_versioned_with_lookup_table() {
        let r = Pubkey::new_unique();
        let s = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let lookup_a = Pubkey::new_unique();
        let lookup_b = Pubkey::new_unique();
        let tx = tx_with(
            AccountKeysSource::Versioned {
                static_keys: vec![r, s, k],
                resolved_lookup_keys: Some(vec![lookup_a, lookup_b]),
            },
            vec![1_000_000_000, 0, 0, 0, 0],
            vec![2_000_000_000, 0, 0, 0, 0],
            vec![],
        );
        let descriptor = validate_native_transfer(&tx, &r, &k, 1_000_000_000).unwrap();
        assert_eq!(descriptor.delta_base_units, 1_000_000_000);
    }

    #[test]
    fn versioned_resolution_failure_is_account_keys_error() {
        let r = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let tx = tx_with(
            AccountKeysSource::Versioned {
                static_keys: vec![r, k],
                resolved_lookup_keys: None,
            },
            vec![0, 0],
            vec![0, 0],
            vec![],
        );
        let err = validate_native_transfer(&tx, &r, &k, 1).unwrap_err();
        assert!(matches!(err, PaymentError::AccountKeysError { .. }));
    }

    #[test]
    fn memo_fallback_validates_when_reference_absent_from_keys() {
        let r = Pubkey::new_unique();
        let s = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let memo_ix = LedgerInstruction {
            program_id: MEMO_PROGRAM_ID,
            accounts: vec![],
            data: format!("payment ref:{k}").into_bytes(),
        };
        let tx = tx_with(
            AccountKeysSource::Legacy(vec![r, s]),
            vec![0, 0],
            vec![1_000_000_000, 0],
            vec![memo_ix],
        );
        let descriptor = validate_native_transfer(&tx, &r, &k, 1_000_000_000).unwrap();
        assert_eq!(descriptor.method, ValidationMethod::MemoBased);
    }

    #[test]
    fn reference_absent_from_both_paths_fails() {
        let r = Pubkey::new_unique();
        let s = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let tx = tx_with(
            AccountKeysSource::Legacy(vec![r, s]),
            vec![0, 0],
            vec![1_000_000_000, 0],
            vec![],
        );
        let err = validate_native_transfer(&tx, &r, &k, 1_000_000_000).unwrap_err();
        assert!(matches!(err, PaymentError::ReferenceNotFound));
    }

    #[test]
    fn tolerance_boundary_exact() {
        let r = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let expected = 1_000_000u64;
        let tolerance = balance_tolerance(expected);

        let at_floor = tx_with(
            AccountKeysSource::Legacy(vec![r, k]),
            vec![0, 0],
            vec![expected - tolerance, 0],
            vec![],
        );
        assert!(validate_native_transfer(&at_floor, &r, &k, expected).is_ok());

        let below_floor = tx_with(
            AccountKeysSource::Legacy(vec![r, k]),
            vec![0, 0],
            vec![expected - tolerance - 1, 0],
            vec![],
        );
        assert!(matches!(
            validate_native_transfer(&below_floor, &r, &k, expected).unwrap_err(),
            PaymentError::AmountTooLow { .. }
        ));

        let overpaid = tx_with(
            AccountKeysSource::Legacy(vec![r, k]),
            vec![0, 0],
            vec![expected + 10 * tolerance, 0],
            vec![],
        );
        let descriptor = validate_native_transfer(&overpaid, &r, &k, expected).unwrap();
        assert!(descriptor.is_overpayment());
    }

    #[test]
    fn transaction_level_error_is_transaction_failed() {
        let r = Pubkey::new_unique();
        let k = Pubkey::new_unique();
        let mut tx = tx_with(
            AccountKeysSource::Legacy(vec![r, k]),
            vec![0, 0],
            vec![0, 0],
            vec![],
        );
        tx.err = Some("InstructionError".into());
        let err = validate_native_transfer(&tx, &r, &k, 1).unwrap_err();
        assert!(matches!(err, PaymentError::TransactionFailed { .. }));
    }
}
