//! Well-known external program identifiers referenced by the core (§6).

use solana_sdk::pubkey::Pubkey;

/// A well-known on-ledger program that consumes no state and simply attaches
/// a UTF-8 byte string to the transaction.
pub const MEMO_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

/// `max(1000 base units, 0.5% of expected)` — §4.3 step 5.
#[must_use]
pub fn balance_tolerance(expected_base_units: u64) -> u64 {
    let percentage = (u128::from(expected_base_units) * 5 / 1000) as u64;
    percentage.max(1_000)
}
