//! Cryptographic sortition
//!
//! This crate provides the verifiable random function used for leader
//! election and block seeds, the sortition threshold test built on top of
//! it, and the consensus parameters that drive both.

pub mod config;
pub mod error;
pub mod sortition;
pub mod vrf;

pub use config::ConsensusConfig;
pub use error::{ConsensusError, ConsensusResult};
pub use sortition::{
    block_seed_message, output_fraction, proposer_message, verify_block_seed, verify_proposer,
    Sortition, SortitionResult, PROPOSER_ROLE,
};
pub use vrf::{VrfKeypair, VrfOutput, VrfProof, VrfPublicKey};
