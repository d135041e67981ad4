//! Transaction admission checks that need no execution

use crate::traits::TxValidator;
use chain_core::{Transaction, TxType};
use chain_vm::{StateDB, VmError, VmResult};

/// Checks signature, nonce floor and recipient presence.
///
/// The nonce may be ahead of `current + 1` since a block can carry several
/// transactions from one sender; exact sequencing is enforced on execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatelessTxValidator;

impl TxValidator for StatelessTxValidator {
    fn validate_tx(&self, state: &StateDB, tx: &Transaction) -> VmResult<()> {
        let sender = tx.sender().map_err(|_| VmError::InvalidSignature)?;

        let expected = state.nonce(&sender) + 1;
        if tx.nonce < expected {
            return Err(VmError::InvalidNonce {
                expected,
                actual: tx.nonce,
            });
        }

        if tx.tx_type == TxType::Send && tx.to.is_none() {
            return Err(VmError::MissingRecipient);
        }
        Ok(())
    }
}
