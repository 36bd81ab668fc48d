//! Domain types: the payment intent being monitored and its supporting
//! value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Which instrument a payment is denominated in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// The chain's native coin (lamports on Solana).
    #[default]
    Native,
    /// A fungible SPL token, identified by its mint.
    Token,
}

impl PaymentKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Token => "token",
        }
    }
}

impl std::fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "token" => Ok(Self::Token),
            other => Err(format!("invalid payment kind: {other}")),
        }
    }
}

/// Lifecycle status of a payment. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
    Expired,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// A payment in a terminal status is never re-confirmed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            other => Err(format!("invalid payment status: {other}")),
        }
    }
}

/// Optional contact details carried alongside the payment for the email
/// fan-out leg. Delivery mechanics are out of scope; only the trigger
/// contract (do we have an address to enqueue to) matters here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CustomerContact {
    pub email: Option<String>,
}

/// The payment intent the Monitor drives to a terminal state.
///
/// `kind = Native` implies `token_mint` is `None`; `kind = Token` implies it
/// is `Some`. This invariant is enforced by the two constructors and by
/// `validate_invariants`, never by the type system alone, to keep
/// (de)serialization from the repository straightforward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    /// Globally unique external lookup token, embedded in the on-chain
    /// transfer instruction by the Transaction Constructor.
    pub reference: Pubkey,
    /// Owning merchant's identifier (opaque to the monitor).
    pub merchant_id: String,
    pub customer: CustomerContact,
    pub kind: PaymentKind,
    /// Present iff `kind == Token`.
    pub token_mint: Option<Pubkey>,
    /// Arbitrary-precision decimal amount in the instrument's display units.
    pub amount: String,
    pub recipient: Pubkey,
    pub status: PaymentStatus,
    /// Set when `status` becomes `Confirmed`; immutable thereafter.
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[must_use]
    pub fn new_native(
        reference: Pubkey,
        merchant_id: String,
        amount: String,
        recipient: Pubkey,
    ) -> Self {
        let now = Utc::now();
        Self {
            reference,
            merchant_id,
            customer: CustomerContact::default(),
            kind: PaymentKind::Native,
            token_mint: None,
            amount,
            recipient,
            status: PaymentStatus::Pending,
            signature: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn new_token(
        reference: Pubkey,
        merchant_id: String,
        amount: String,
        recipient: Pubkey,
        token_mint: Pubkey,
    ) -> Self {
        let mut payment = Self::new_native(reference, merchant_id, amount, recipient);
        payment.kind = PaymentKind::Token;
        payment.token_mint = Some(token_mint);
        payment
    }

    #[must_use]
    pub fn is_token(&self) -> bool {
        self.kind == PaymentKind::Token
    }

    /// `kind = native` implies `token_mint` absent; `kind = token` implies present.
    #[must_use]
    pub fn has_consistent_instrument(&self) -> bool {
        match self.kind {
            PaymentKind::Native => self.token_mint.is_none(),
            PaymentKind::Token => self.token_mint.is_some(),
        }
    }
}

/// Which rule validated a native-coin transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    AccountBased,
    MemoBased,
}

impl ValidationMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountBased => "account-based",
            Self::MemoBased => "memo-based",
        }
    }
}

impl std::fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a successful native-coin transfer validation (§4.3 step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub method: ValidationMethod,
    pub expected_base_units: u64,
    pub tolerance_base_units: u64,
    pub delta_base_units: u64,
}

impl TransferDescriptor {
    #[must_use]
    pub fn is_overpayment(&self) -> bool {
        self.delta_base_units > self.expected_base_units + self.tolerance_base_units
    }

    #[must_use]
    pub fn overpayment_base_units(&self) -> u64 {
        self.delta_base_units
            .saturating_sub(self.expected_base_units + self.tolerance_base_units)
    }
}

/// Aggregate per-tick distribution logged at the end of a Monitor Loop cycle
/// (§4.7 step 3).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleDistribution {
    pub native: usize,
    pub token: usize,
    pub confirmed: usize,
    pub retryable_failures: usize,
    pub terminal_failures: usize,
    pub fallbacks_invoked: usize,
}
