//! Transfer Validator (§4.3/§4.4): given a signature and an expected
//! (recipient, amount, [token]) tuple, decides valid/invalid.

pub mod native;
pub mod token;

pub use native::{extract_account_keys, validate_native_transfer};
pub use token::validate_token_transfer;
