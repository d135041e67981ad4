//! Node error types

use chain_consensus::ConsensusError;
use chain_core::{BlockNumber, CoreError, Hash};
use chain_db::DbError;
use chain_vm::VmError;
use thiserror::Error;

/// Which parent check a block failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentMismatch {
    Height {
        expected: BlockNumber,
        actual: BlockNumber,
    },
    Hash {
        expected: Hash,
        actual: Hash,
    },
}

impl std::fmt::Display for ParentMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParentMismatch::Height { expected, actual } => {
                write!(f, "height {} does not follow head, expected {}", actual, expected)
            }
            ParentMismatch::Hash { expected, actual } => {
                write!(f, "parent hash {} is not the head {}", actual, expected)
            }
        }
    }
}

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is malformed or does not fit the chain
    Structural,
    /// The input breaks a consensus rule
    ConsensusViolation,
    /// Local data is inconsistent
    StateCorruption,
}

/// Node error type
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid parent: {0}")]
    InvalidParent(ParentMismatch),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Invalid tx hash: header {expected}, computed {actual}")]
    InvalidTxHash { expected: Hash, actual: Hash },

    #[error("Invalid transaction at index {index}: {source}")]
    InvalidTransaction {
        index: usize,
        #[source]
        source: VmError,
    },

    #[error("Invalid empty block: {0}")]
    InvalidEmptyBlock(String),

    #[error("Not the proposer of this round: {0}")]
    NotProposer(String),

    #[error("Chain is not initialized")]
    NotInitialized,

    #[error("Genesis already exists")]
    GenesisExists,

    #[error("Stored chain is corrupted: {0}")]
    CorruptedChain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State transition error: {0}")]
    Transition(#[from] VmError),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl ChainError {
    /// Classify the failure. Malformed key or proof material is structural,
    /// a well-formed input that breaks a chain rule is a consensus violation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::InvalidParent(_)
            | ChainError::InvalidSeed(_)
            | ChainError::InvalidTxHash { .. }
            | ChainError::InvalidEmptyBlock(_)
            | ChainError::NotProposer(_) => ErrorKind::ConsensusViolation,
            ChainError::InvalidTransaction { source, .. } | ChainError::Transition(source) => {
                transition_kind(source)
            }
            ChainError::Consensus(err) => consensus_kind(err),
            ChainError::CorruptedChain(_) | ChainError::Storage(_) => ErrorKind::StateCorruption,
            ChainError::NotInitialized
            | ChainError::GenesisExists
            | ChainError::Config(_)
            | ChainError::Core(_) => ErrorKind::Structural,
        }
    }
}

fn transition_kind(err: &VmError) -> ErrorKind {
    match err {
        VmError::InvalidNonce { .. }
        | VmError::InsufficientFunds { .. }
        | VmError::StateRootMismatch { .. } => ErrorKind::ConsensusViolation,
        VmError::State(_) => ErrorKind::StateCorruption,
        VmError::InvalidSignature | VmError::MissingRecipient | VmError::Fee(_) | VmError::Core(_) => {
            ErrorKind::Structural
        }
    }
}

fn consensus_kind(err: &ConsensusError) -> ErrorKind {
    match err {
        ConsensusError::VerificationFailed
        | ConsensusError::InvalidSeed(_)
        | ConsensusError::NotEligible { .. } => ErrorKind::ConsensusViolation,
        ConsensusError::InvalidPublicKey(_)
        | ConsensusError::InvalidSecretKey(_)
        | ConsensusError::MalformedProof(_)
        | ConsensusError::Config(_)
        | ConsensusError::Serialization(_) => ErrorKind::Structural,
    }
}

/// Result type for node operations
pub type ChainResult<T> = Result<T, ChainError>;
