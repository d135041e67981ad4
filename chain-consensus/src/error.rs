//! Consensus error types

use thiserror::Error;

/// Consensus error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsensusError {
    /// Public key bytes do not encode a usable group element
    #[error("Invalid VRF public key: {0}")]
    InvalidPublicKey(String),

    /// Secret key material is unusable
    #[error("Invalid VRF secret key: {0}")]
    InvalidSecretKey(String),

    /// Proof bytes cannot be parsed
    #[error("Malformed VRF proof: {0}")]
    MalformedProof(String),

    /// Proof does not verify for the given key and message
    #[error("VRF verification failed")]
    VerificationFailed,

    /// Claimed seed is empty, all-zero, or differs from the proven output
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// Proven sortition output is below the threshold
    #[error("Sortition output {fraction} below threshold {threshold}")]
    NotEligible { fraction: f64, threshold: f64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConsensusError {
    fn from(err: serde_json::Error) -> Self {
        ConsensusError::Serialization(err.to_string())
    }
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
