//! Core blockchain data structures
//!
//! This crate provides the fundamental building blocks shared by every
//! other crate of the workspace:
//! - Basic types (Hash, Address, Seed, Network)
//! - Arbitrary-precision token amounts
//! - Transaction and Block structures with their canonical hashing
//! - Merkle commitments over ordered hash lists

pub mod amount;
pub mod block;
pub mod error;
pub mod merkle;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use amount::*;
pub use block::*;
pub use error::*;
pub use merkle::*;
pub use transaction::*;
pub use types::*;
