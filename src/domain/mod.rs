//! Domain layer: the Payment data model, the closed error taxonomy, and the
//! contracts for external collaborators.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{PaymentError, RpcSubCode, Severity};
pub use traits::{
    AccountKeysSource, LedgerClient, LedgerInstruction, LedgerTransaction, Notifier,
    PaymentRepository, ReferenceLookup, TokenTransferExpectation, WebhookPayload,
};
pub use types::{
    CustomerContact, CycleDistribution, Payment, PaymentKind, PaymentStatus, TransferDescriptor,
    ValidationMethod,
};
