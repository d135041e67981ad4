//! Collaborators the blockchain component consumes

use chain_core::{Block, Transaction};
use chain_vm::{StateDB, VmResult};

/// Source of transactions for new blocks
pub trait Mempool: Send + Sync {
    /// Ordered transactions for the next proposal
    fn build_block_transactions(&self) -> Vec<Transaction>;

    /// Forget what `block` made obsolete
    fn reset_to(&self, block: &Block);
}

/// Validator set cache kept in step with the chain
pub trait ValidatorsCache: Send + Sync {
    /// Refresh if the given applied transactions touch identities
    fn refresh_if_updated(&self, transactions: &[Transaction]);
}

/// Per-transaction admission check against the current state
pub trait TxValidator: Send + Sync {
    fn validate_tx(&self, state: &StateDB, tx: &Transaction) -> VmResult<()>;
}
