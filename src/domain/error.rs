//! The closed error taxonomy the Classifier dispatches on (§7).
//!
//! Every ledger/database call the monitor makes is expected to surface one
//! of these variants. `severity()` and `is_retryable()` are pure functions
//! of the variant (and, for `RpcError`, of the carried sub-code), matching
//! the design note that severity/retryability derive from the tag alone.

use thiserror::Error;

/// Stable severity ladder used in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// RPC sub-codes relevant to `RpcError`'s conditional retryability
/// ("yes iff code ∈ {internal, rate-limit, unavailable, gateway-timeout}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcSubCode {
    Internal,
    RateLimit,
    Unavailable,
    GatewayTimeout,
    Other,
}

impl RpcSubCode {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// One variant per row of §7's error taxonomy table.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("rpc connection failed: {message}")]
    RpcConnectionFailed { message: String },

    #[error("network timeout after {timeout_secs}s")]
    NetworkTimeout { timeout_secs: u64 },

    #[error("rpc error ({code:?}): {message}")]
    RpcError { code: RpcSubCode, message: String },

    #[error("database operation failed: {message}")]
    DatabaseError { message: String },

    #[error("transaction not yet observed on-chain")]
    TransactionNotFound,

    #[error("on-chain execution error: {message}")]
    TransactionFailed { message: String },

    #[error("could not resolve account keys: {message}")]
    AccountKeysError { message: String },

    #[error("account keys structurally absent or empty")]
    InvalidAccountKeys,

    #[error("pre/post balance arrays absent")]
    MissingBalanceMetadata,

    #[error("recipient pubkey absent from account keys")]
    RecipientNotFound,

    #[error("reference absent from both account-key and memo paths")]
    ReferenceNotFound,

    #[error(
        "amount too low: delta {delta_base_units} below expected {expected_base_units} minus tolerance {tolerance_base_units}"
    )]
    AmountTooLow {
        delta_base_units: u64,
        expected_base_units: u64,
        tolerance_base_units: u64,
    },

    #[error("native-path validation failed after classification: {message}")]
    SolValidationFailed { message: String },

    #[error("unexpected error inside validator: {message}")]
    ValidationException { message: String },

    /// Surfaced only by non-primary Fanout legs (§4.8 steps 2-5); the
    /// Confirmer warning-logs this and continues, it never reaches the
    /// Classifier.
    #[error("external notifier delivery failed: {message}")]
    ExternalNotifierFailed { message: String },
}

impl PaymentError {
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::RpcConnectionFailed { .. } => "RpcConnectionFailed",
            Self::NetworkTimeout { .. } => "NetworkTimeout",
            Self::RpcError { .. } => "RpcError",
            Self::DatabaseError { .. } => "DatabaseError",
            Self::TransactionNotFound => "TransactionNotFound",
            Self::TransactionFailed { .. } => "TransactionFailed",
            Self::AccountKeysError { .. } => "AccountKeysError",
            Self::InvalidAccountKeys => "InvalidAccountKeys",
            Self::MissingBalanceMetadata => "MissingBalanceMetadata",
            Self::RecipientNotFound => "RecipientNotFound",
            Self::ReferenceNotFound => "ReferenceNotFound",
            Self::AmountTooLow { .. } => "AmountTooLow",
            Self::SolValidationFailed { .. } => "SolValidationFailed",
            Self::ValidationException { .. } => "ValidationException",
            Self::ExternalNotifierFailed { .. } => "ExternalNotifierFailed",
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::RpcConnectionFailed { .. } | Self::NetworkTimeout { .. } => Severity::Critical,
            Self::DatabaseError { .. } => Severity::Critical,
            Self::RpcError { .. }
            | Self::TransactionNotFound
            | Self::AccountKeysError { .. }
            | Self::MissingBalanceMetadata => Severity::Medium,
            Self::TransactionFailed { .. }
            | Self::InvalidAccountKeys
            | Self::RecipientNotFound
            | Self::ReferenceNotFound
            | Self::AmountTooLow { .. }
            | Self::SolValidationFailed { .. } => Severity::High,
            Self::ValidationException { .. } | Self::ExternalNotifierFailed { .. } => {
                Severity::Low
            }
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RpcConnectionFailed { .. }
            | Self::NetworkTimeout { .. }
            | Self::TransactionNotFound
            | Self::MissingBalanceMetadata => true,
            Self::RpcError { code, .. } => code.is_retryable(),
            Self::DatabaseError { .. }
            | Self::TransactionFailed { .. }
            | Self::AccountKeysError { .. }
            | Self::InvalidAccountKeys
            | Self::RecipientNotFound
            | Self::ReferenceNotFound
            | Self::AmountTooLow { .. }
            | Self::SolValidationFailed { .. }
            | Self::ValidationException { .. }
            | Self::ExternalNotifierFailed { .. } => false,
        }
    }

    /// High-severity native-path failures eligible for the Fallback Path (§4.9).
    #[must_use]
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::TransactionFailed { .. } | Self::MissingBalanceMetadata
        )
    }
}
