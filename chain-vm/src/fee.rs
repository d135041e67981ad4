//! Transaction fees and the proposer's share of them

use crate::{VmError, VmResult};
use chain_core::{Amount, Transaction, TxType};
use serde::{Deserialize, Serialize};

/// Fee policy used by the executor
pub trait FeeModel: Send + Sync {
    /// Fee charged for `tx`
    fn tx_fee(&self, tx: &Transaction) -> Amount;

    /// Part of a block's collected fees credited to the coinbase. The rest
    /// is burned.
    fn proposer_share(&self, fee_pool: &Amount) -> VmResult<Amount>;
}

/// Flat fee per transfer with a fractional proposer share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee charged for every `Send`
    pub fixed_fee: Amount,
    pub proposer_share_numerator: u64,
    pub proposer_share_denominator: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fixed_fee: Amount::zero(),
            proposer_share_numerator: 1,
            proposer_share_denominator: 2,
        }
    }
}

impl FeeSchedule {
    /// Load fee schedule from TOML configuration
    pub fn from_toml(toml_str: &str) -> VmResult<Self> {
        let schedule: FeeSchedule = toml::from_str(toml_str)
            .map_err(|e| VmError::Fee(format!("Failed to parse fee schedule: {}", e)))?;
        schedule.validate()?;
        Ok(schedule)
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> VmResult<String> {
        toml::to_string(self)
            .map_err(|e| VmError::Fee(format!("Failed to serialize fee schedule: {}", e)))
    }

    /// Share must be a proper fraction
    pub fn validate(&self) -> VmResult<()> {
        if self.proposer_share_denominator == 0 {
            return Err(VmError::Fee(
                "Proposer share denominator must be greater than 0".to_string(),
            ));
        }
        if self.proposer_share_numerator > self.proposer_share_denominator {
            return Err(VmError::Fee(format!(
                "Proposer share {}/{} exceeds the collected fees",
                self.proposer_share_numerator, self.proposer_share_denominator
            )));
        }
        Ok(())
    }
}

impl FeeModel for FeeSchedule {
    fn tx_fee(&self, tx: &Transaction) -> Amount {
        match tx.tx_type {
            TxType::Send => self.fixed_fee.clone(),
            TxType::SendInvite | TxType::Approving => Amount::zero(),
        }
    }

    fn proposer_share(&self, fee_pool: &Amount) -> VmResult<Amount> {
        fee_pool
            .mul_div(
                self.proposer_share_numerator,
                self.proposer_share_denominator,
            )
            .map_err(VmError::from)
    }
}
