//! State and state transition engine
//!
//! This crate provides the account state with its speculative and committed
//! modes, the fee policy, and the executor that applies a block's
//! transactions and reward to a state.

pub mod account;
pub mod error;
pub mod executor;
pub mod fee;
pub mod state;

pub use account::{Account, IdentityObject};
pub use error::{VmError, VmResult};
pub use executor::{ApplyMode, BlockExecutor, BlockOutcome};
pub use fee::{FeeModel, FeeSchedule};
pub use state::StateDB;
