//! VM error types

use chain_core::{Amount, CoreError, Hash};
use thiserror::Error;

/// VM error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// Sender cannot be recovered from the signature
    #[error("Invalid signature")]
    InvalidSignature,

    /// Transaction nonce is not the sender's nonce + 1
    #[error("Invalid nonce: expected {expected}, got {actual}")]
    InvalidNonce { expected: u64, actual: u64 },

    /// Sender cannot cover amount plus fee
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    /// Transfer without a recipient
    #[error("Send transaction has no recipient")]
    MissingRecipient,

    /// Root after execution differs from the one the header commits to
    #[error("State root mismatch: header {expected}, computed {actual}")]
    StateRootMismatch { expected: Hash, actual: Hash },

    /// Fee policy error
    #[error("Fee policy error: {0}")]
    Fee(String),

    /// State error
    #[error("State error: {0}")]
    State(String),

    /// Core type error
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;
