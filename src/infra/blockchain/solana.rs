//! Ledger Client Adapter (§2 "Ledger Client Adapter", §6): a thin capability
//! surface wrapping Solana's JSON-RPC, grounded on the teacher's raw
//! `HttpSolanaRpcProvider`/`rpc_call` pattern, stripped of the signing,
//! fee-strategy, and submission-strategy machinery that belonged to the
//! teacher's transaction-*submission* path (out of scope here — this crate
//! only constructs unsigned transactions, per §4.1).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::{instrument, warn};

use crate::consts::{balance_tolerance, MEMO_PROGRAM_ID};
use crate::domain::{
    AccountKeysSource, LedgerClient, LedgerInstruction, LedgerTransaction, PaymentError,
    ReferenceLookup, RpcSubCode, TokenTransferExpectation,
};

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Solana JSON-RPC-backed `LedgerClient` (§6). Only the five read-only
/// capabilities the core needs are implemented; submission/signing is a
/// host-application concern.
pub struct SolanaLedgerClient {
    http_client: Client,
    rpc_url: String,
}

impl SolanaLedgerClient {
    pub fn new(rpc_url: impl Into<String>, config: RpcClientConfig) -> Result<Self, PaymentError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::RpcConnectionFailed {
                message: e.to_string(),
            })?;
        Ok(Self {
            http_client,
            rpc_url: rpc_url.into(),
        })
    }

    #[must_use]
    pub fn with_defaults(rpc_url: impl Into<String>) -> Self {
        Self::new(rpc_url, RpcClientConfig::default()).expect("reqwest client construction never fails with a plain timeout")
    }

    #[instrument(skip(self, params))]
    async fn rpc_call<P: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<R, PaymentError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentError::NetworkTimeout { timeout_secs: 30 }
                } else {
                    PaymentError::RpcConnectionFailed {
                        message: e.to_string(),
                    }
                }
            })?;

        let rpc_response: JsonRpcResponse<R> = response.json().await.map_err(|e| {
            PaymentError::RpcError {
                code: RpcSubCode::Internal,
                message: format!("deserialization error: {e}"),
            }
        })?;

        if let Some(error) = rpc_response.error {
            let code = classify_rpc_error_code(error.code);
            return Err(PaymentError::RpcError {
                code,
                message: format!("{}: {}", error.code, error.message),
            });
        }

        rpc_response
            .result
            .ok_or(PaymentError::TransactionNotFound)
    }
}

fn classify_rpc_error_code(code: i64) -> RpcSubCode {
    match code {
        -32005 => RpcSubCode::RateLimit,
        -32603 => RpcSubCode::Internal,
        -32000..=-32001 => RpcSubCode::Unavailable,
        -32002 => RpcSubCode::GatewayTimeout,
        _ => RpcSubCode::Other,
    }
}

fn commitment_str(commitment: CommitmentConfig) -> &'static str {
    match commitment.commitment {
        solana_commitment_config::CommitmentLevel::Finalized => "finalized",
        solana_commitment_config::CommitmentLevel::Processed => "processed",
        _ => "confirmed",
    }
}

#[derive(Debug, Deserialize)]
struct RpcSignatureEntry {
    signature: String,
}

#[derive(Debug, Deserialize)]
struct RpcUiMessage {
    #[serde(rename = "accountKeys")]
    account_keys: Vec<String>,
    instructions: Vec<RpcUiInstruction>,
    #[serde(rename = "addressTableLookups", default)]
    address_table_lookups: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RpcUiInstruction {
    #[serde(rename = "programIdIndex")]
    program_id_index: usize,
    accounts: Vec<usize>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct RpcUiMeta {
    err: Option<serde_json::Value>,
    #[serde(rename = "preBalances")]
    pre_balances: Option<Vec<u64>>,
    #[serde(rename = "postBalances")]
    post_balances: Option<Vec<u64>>,
    #[serde(rename = "loadedAddresses")]
    loaded_addresses: Option<RpcLoadedAddresses>,
}

#[derive(Debug, Deserialize)]
struct RpcLoadedAddresses {
    writable: Vec<String>,
    readonly: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcEncodedTransaction {
    message: RpcUiMessage,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionResult {
    transaction: RpcEncodedTransaction,
    meta: Option<RpcUiMeta>,
    version: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RpcUiTokenAmount {
    /// Raw base-unit amount as the node reports it, e.g. `"1500000"` for a
    /// 6-decimal mint — used directly instead of `uiAmountString` so the
    /// balance-delta comparison never goes through binary floating point.
    amount: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct RpcTokenBalance {
    mint: String,
    owner: Option<String>,
    #[serde(rename = "uiTokenAmount")]
    ui_token_amount: RpcUiTokenAmount,
}

#[derive(Debug, Deserialize)]
struct RpcUiMetaWithTokenBalances {
    err: Option<serde_json::Value>,
    #[serde(rename = "preTokenBalances", default)]
    pre_token_balances: Vec<RpcTokenBalance>,
    #[serde(rename = "postTokenBalances", default)]
    post_token_balances: Vec<RpcTokenBalance>,
}

#[derive(Debug, Deserialize)]
struct RpcTokenTransactionResult {
    transaction: RpcEncodedTransaction,
    meta: RpcUiMetaWithTokenBalances,
}

fn parse_pubkey(s: &str) -> Result<Pubkey, PaymentError> {
    s.parse().map_err(|_| PaymentError::AccountKeysError {
        message: format!("malformed base58 pubkey: {s}"),
    })
}

/// Translates the raw JSON-RPC transaction shape into `LedgerTransaction`,
/// performing the legacy-vs-versioned split at the boundary so the core's
/// own `extract_account_keys` only ever sees the already-tagged sum type
/// (§9 "Versioned vs. legacy transactions").
fn to_ledger_transaction(signature: &str, raw: RpcTransactionResult) -> Result<LedgerTransaction, PaymentError> {
    let static_keys: Result<Vec<Pubkey>, PaymentError> =
        raw.transaction.message.account_keys.iter().map(|s| parse_pubkey(s)).collect();
    let static_keys = static_keys?;

    let is_versioned = !matches!(raw.version.as_ref().and_then(|v| v.as_str()), Some("legacy") | None);

    let loaded = raw.meta.as_ref().and_then(|m| m.loaded_addresses.as_ref());

    let account_keys = if is_versioned {
        let resolved_lookup_keys = loaded
            .map(|loaded| -> Result<Vec<Pubkey>, PaymentError> {
                loaded
                    .writable
                    .iter()
                    .chain(loaded.readonly.iter())
                    .map(|s| parse_pubkey(s))
                    .collect()
            })
            .transpose()?;
        AccountKeysSource::Versioned {
            static_keys,
            resolved_lookup_keys,
        }
    } else {
        AccountKeysSource::Legacy(static_keys)
    };

    let all_keys_for_instruction_resolution = match &account_keys {
        AccountKeysSource::Legacy(keys) => keys.clone(),
        AccountKeysSource::Versioned { static_keys, resolved_lookup_keys } => {
            let mut keys = static_keys.clone();
            if let Some(lookup) = resolved_lookup_keys {
                keys.extend(lookup.iter().copied());
            }
            keys
        }
    };

    let instructions = raw
        .transaction
        .message
        .instructions
        .iter()
        .map(|ix| -> Result<LedgerInstruction, PaymentError> {
            let program_id = *all_keys_for_instruction_resolution
                .get(ix.program_id_index)
                .ok_or(PaymentError::InvalidAccountKeys)?;
            let accounts = ix
                .accounts
                .iter()
                .filter_map(|idx| all_keys_for_instruction_resolution.get(*idx).copied())
                .collect();
            let data = bs58::decode(&ix.data).into_vec().unwrap_or_default();
            Ok(LedgerInstruction {
                program_id,
                accounts,
                data,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (err, pre_balances, post_balances) = match raw.meta {
        Some(meta) => (
            meta.err.map(|v| v.to_string()),
            meta.pre_balances,
            meta.post_balances,
        ),
        None => (None, None, None),
    };

    Ok(LedgerTransaction {
        signature: signature.to_string(),
        account_keys,
        instructions,
        err,
        pre_balances,
        post_balances,
    })
}

#[async_trait]
impl LedgerClient for SolanaLedgerClient {
    #[instrument(skip(self))]
    async fn find_by_reference(
        &self,
        reference: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<ReferenceLookup, PaymentError> {
        let params = json!([
            reference.to_string(),
            { "commitment": commitment_str(commitment), "limit": 1 }
        ]);
        let entries: Vec<RpcSignatureEntry> = self.rpc_call("getSignaturesForAddress", params).await?;
        Ok(match entries.into_iter().next() {
            Some(entry) => ReferenceLookup::Found { signature: entry.signature },
            None => ReferenceLookup::NotFound,
        })
    }

    #[instrument(skip(self))]
    async fn get_transaction(
        &self,
        signature: &str,
        commitment: CommitmentConfig,
    ) -> Result<Option<LedgerTransaction>, PaymentError> {
        let params = json!([
            signature,
            {
                "encoding": "json",
                "commitment": commitment_str(commitment),
                "maxSupportedTransactionVersion": 0,
            }
        ]);

        let raw: Option<RpcTransactionResult> = match self.rpc_call("getTransaction", params).await {
            Ok(raw) => raw,
            Err(PaymentError::TransactionNotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        match raw {
            Some(raw) => Ok(Some(to_ledger_transaction(signature, raw)?)),
            None => Ok(None),
        }
    }

    /// Token path (§4.4): checks the mint's per-owner token-balance delta
    /// directly from `meta.preTokenBalances`/`postTokenBalances`'s
    /// `uiTokenAmount.amount` (the raw base-unit figure the chain itself
    /// reports for a checked transfer), rather than re-deriving it from raw
    /// instruction data or going through the lossy `uiAmountString`.
    #[instrument(skip(self, expectation))]
    async fn validate_transfer(
        &self,
        signature: &str,
        expectation: TokenTransferExpectation<'_>,
    ) -> Result<(), PaymentError> {
        let params = json!([
            signature,
            {
                "encoding": "json",
                "commitment": commitment_str(expectation.commitment),
                "maxSupportedTransactionVersion": 0,
            }
        ]);

        let raw: Option<RpcTokenTransactionResult> = match self.rpc_call("getTransaction", params).await {
            Ok(raw) => raw,
            Err(PaymentError::TransactionNotFound) => return Err(PaymentError::TransactionNotFound),
            Err(err) => return Err(err),
        };
        let raw = raw.ok_or(PaymentError::TransactionNotFound)?;

        if let Some(err) = raw.meta.err {
            return Err(PaymentError::TransactionFailed { message: err.to_string() });
        }

        let account_keys: Result<Vec<Pubkey>, PaymentError> = raw
            .transaction
            .message
            .account_keys
            .iter()
            .map(|s| parse_pubkey(s))
            .collect();
        let account_keys = account_keys?;

        let reference_present = account_keys.contains(expectation.reference)
            || raw.transaction.message.instructions.iter().any(|ix| {
                account_keys
                    .get(ix.program_id_index)
                    .is_some_and(|id| *id == MEMO_PROGRAM_ID)
                    && bs58::decode(&ix.data)
                        .into_vec()
                        .ok()
                        .and_then(|bytes| String::from_utf8(bytes).ok())
                        .map(|decoded| decoded.contains(&expectation.reference.to_string()))
                        .unwrap_or(false)
            });
        if !reference_present {
            return Err(PaymentError::ReferenceNotFound);
        }

        let owner_matches = |b: &&RpcTokenBalance| {
            b.owner.as_deref() == Some(&expectation.recipient.to_string())
                && b.mint == expectation.token_mint.to_string()
        };

        let pre_entry = raw.meta.pre_token_balances.iter().find(owner_matches);
        let post_entry = raw.meta.post_token_balances.iter().find(owner_matches);

        let Some(post_entry) = post_entry else {
            return Err(PaymentError::RecipientNotFound);
        };

        let pre_base_units: u64 = pre_entry
            .map(|b| b.ui_token_amount.amount.parse::<u64>())
            .transpose()
            .map_err(|_| PaymentError::ValidationException {
                message: "malformed pre-transfer token balance".into(),
            })?
            .unwrap_or(0);

        let post_base_units: u64 =
            post_entry
                .ui_token_amount
                .amount
                .parse()
                .map_err(|_| PaymentError::ValidationException {
                    message: "malformed post-transfer token balance".into(),
                })?;

        // Base-unit math throughout: the node reports `amount` pre-scaled by
        // the mint's own decimals, so no float conversion is ever needed for
        // the delta itself — only for scaling the human-readable expectation.
        let expected_decimal: Decimal =
            expectation.amount.parse().map_err(|_| PaymentError::ValidationException {
                message: format!("malformed token amount: {}", expectation.amount),
            })?;
        let scale = Decimal::from(10u64.pow(u32::from(post_entry.ui_token_amount.decimals)));
        let expected_base_units = expected_decimal
            .checked_mul(scale)
            .and_then(|d| d.to_u64())
            .ok_or_else(|| PaymentError::ValidationException {
                message: format!("token amount out of range: {}", expectation.amount),
            })?;

        let delta_base_units = post_base_units.saturating_sub(pre_base_units);
        let tolerance_base_units = balance_tolerance(expected_base_units);
        let floor = expected_base_units.saturating_sub(tolerance_base_units);

        if delta_base_units < floor {
            return Err(PaymentError::AmountTooLow {
                delta_base_units,
                expected_base_units,
                tolerance_base_units,
            });
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64, PaymentError> {
        #[derive(Deserialize)]
        struct BalanceResult {
            value: u64,
        }
        let params = json!([pubkey.to_string()]);
        let result: BalanceResult = self.rpc_call("getBalance", params).await?;
        Ok(result.value)
    }

    #[instrument(skip(self))]
    async fn get_latest_blockhash(&self) -> Result<(String, u64), PaymentError> {
        #[derive(Deserialize)]
        struct BlockhashValue {
            blockhash: String,
            #[serde(rename = "lastValidBlockHeight")]
            last_valid_block_height: u64,
        }
        #[derive(Deserialize)]
        struct BlockhashResult {
            value: BlockhashValue,
        }
        let params = json!([{ "commitment": "confirmed" }]);
        let result: BlockhashResult = self.rpc_call("getLatestBlockhash", params).await?;
        Ok((result.value.blockhash, result.value.last_valid_block_height))
    }
}
