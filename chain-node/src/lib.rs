//! Blockchain node core
//!
//! This crate assembles the other crates into the `Blockchain` component:
//! chain initialization, block proposal, block validation and insertion,
//! and the chain head. Mempool, validator cache and transaction validation
//! are reached through the traits in [`traits`], with in-memory defaults.

pub mod blockchain;
pub mod config;
pub mod error;
pub mod mempool;
pub mod traits;
pub mod validation;
pub mod validators;

pub use blockchain::Blockchain;
pub use config::{GenesisAlloc, GenesisConfig, NodeConfig};
pub use error::{ChainError, ChainResult, ErrorKind, ParentMismatch};
pub use mempool::TxPool;
pub use traits::{Mempool, TxValidator, ValidatorsCache};
pub use validation::StatelessTxValidator;
pub use validators::StaticValidators;
