//! Transaction Constructor (§4.1): assembles an unsigned transfer
//! transaction for either instrument, guaranteeing the reference key is
//! addressable by any "find transaction by account touched" query.
//!
//! Grounded on the teacher's `infra/blockchain/solana.rs` transfer-
//! instruction assembly (`transfer_sol`/`transfer_token`: ATA derivation,
//! mint-decimals lookup, checked-transfer construction), stripped of
//! priority-fee/Jito concerns that belong to submission, not construction.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use thiserror::Error;

use crate::consts::MEMO_PROGRAM_ID;

/// Errors surfaced verbatim to the caller (§4.1).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstructError {
    #[error("insufficient balance to cover the transfer")]
    InsufficientBalance,
    #[error("token account is frozen")]
    TokenAccountFrozen,
    #[error("token mint is not initialized")]
    TokenMintNotInitialized,
    #[error("recipient account is not initialized")]
    RecipientUninitialized,
}

/// Which instrument the constructed transfer moves, carrying what the
/// instruction-assembly step needs per variant.
pub enum Instrument {
    Native,
    Token {
        mint: Pubkey,
        decimals: u8,
        token_program: Pubkey,
    },
}

/// Pre-fetched account state the caller supplies so the Constructor can
/// surface §4.1's four error variants before assembling an instruction that
/// would only fail on submission (out of scope here — this crate never
/// submits). The caller (the Monitor's payout path, not currently wired
/// since outbound disbursement is out of scope per §1) is responsible for
/// fetching these via `LedgerClient`/`get_account_info`-equivalent calls.
pub struct AccountState {
    pub payer_balance_base_units: u64,
    pub mint_initialized: bool,
    pub recipient_initialized: bool,
    pub source_token_frozen: bool,
}

impl AccountState {
    /// A state snapshot with every precondition satisfied, for the native
    /// path or for callers that have already verified the token side
    /// out-of-band.
    #[must_use]
    pub fn clear(payer_balance_base_units: u64) -> Self {
        Self {
            payer_balance_base_units,
            mint_initialized: true,
            recipient_initialized: true,
            source_token_frozen: false,
        }
    }
}

/// Inputs to the Constructor (§4.1).
pub struct TransferSpec {
    pub payer: Pubkey,
    pub recipient: Pubkey,
    /// Base units already multiplied by `10^decimals` (native: `10^9`).
    pub amount_base_units: u64,
    pub reference: Pubkey,
    pub instrument: Instrument,
    pub memo_text: Option<String>,
    pub state: AccountState,
}

/// Appends the reference key as a read-only, non-signing account on the
/// given instruction so that it becomes addressable by account-touched
/// lookups (§4.1 contract, §8 property 2).
fn with_reference_key(mut instruction: Instruction, reference: Pubkey) -> Instruction {
    instruction
        .accounts
        .push(AccountMeta::new_readonly(reference, false));
    instruction
}

fn memo_instruction(memo_text: &str) -> Instruction {
    Instruction {
        program_id: MEMO_PROGRAM_ID,
        accounts: vec![],
        data: memo_text.as_bytes().to_vec(),
    }
}

/// Builds the unsigned transaction described by `spec`. The payer is never
/// made to sign here; signing is the caller's/wallet's responsibility.
pub fn build_transfer(spec: TransferSpec) -> Result<Transaction, ConstructError> {
    if spec.state.payer_balance_base_units < spec.amount_base_units {
        return Err(ConstructError::InsufficientBalance);
    }

    if matches!(spec.instrument, Instrument::Token { .. }) {
        if !spec.state.mint_initialized {
            return Err(ConstructError::TokenMintNotInitialized);
        }
        if !spec.state.recipient_initialized {
            return Err(ConstructError::RecipientUninitialized);
        }
        if spec.state.source_token_frozen {
            return Err(ConstructError::TokenAccountFrozen);
        }
    }

    let mut instructions = Vec::with_capacity(3);

    match spec.instrument {
        Instrument::Native => {
            let transfer_ix = solana_system_interface::instruction::transfer(
                &spec.payer,
                &spec.recipient,
                spec.amount_base_units,
            );
            instructions.push(with_reference_key(transfer_ix, spec.reference));
        }
        Instrument::Token {
            mint,
            decimals,
            token_program,
        } => {
            let source_ata = get_associated_token_address_with_program_id(
                &spec.payer,
                &mint,
                &token_program,
            );
            let destination_ata = get_associated_token_address_with_program_id(
                &spec.recipient,
                &mint,
                &token_program,
            );

            // Idempotent: a no-op on-chain if the recipient's ATA already exists.
            instructions.push(create_associated_token_account_idempotent(
                &spec.payer,
                &spec.recipient,
                &mint,
                &token_program,
            ));

            let transfer_ix = spl_token_2022::instruction::transfer_checked(
                &token_program,
                &source_ata,
                &mint,
                &destination_ata,
                &spec.payer,
                &[],
                spec.amount_base_units,
                decimals,
            )
            .map_err(|_| ConstructError::TokenMintNotInitialized)?;
            instructions.push(with_reference_key(transfer_ix, spec.reference));
        }
    }

    if let Some(memo_text) = &spec.memo_text {
        instructions.push(memo_instruction(memo_text));
    }

    let message = Message::new(&instructions, Some(&spec.payer));
    Ok(Transaction::new_unsigned(message))
}
