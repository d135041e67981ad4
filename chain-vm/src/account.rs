//! Account model

use crate::{VmError, VmResult};
use chain_core::{Amount, Nonce};
use serde::{Deserialize, Serialize};

/// Identity attached to an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct IdentityObject {
    pub approved: bool,
}

impl IdentityObject {
    pub fn approve(&mut self) {
        self.approved = true;
    }
}

/// Account information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Account {
    /// Account balance
    pub balance: Amount,
    /// Nonce of the last applied transaction
    pub nonce: Nonce,
    /// Identity status
    pub identity: IdentityObject,
}

impl Account {
    /// Create a new empty account
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account with initial balance
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    /// An account equal to the default value is not stored
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Add to balance
    pub fn add_balance(&mut self, amount: &Amount) {
        self.balance += amount;
    }

    /// Subtract from balance
    pub fn sub_balance(&mut self, amount: &Amount) -> VmResult<()> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| VmError::InsufficientFunds {
                required: amount.clone(),
                available: self.balance.clone(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation() {
        let account = Account::new();
        assert_eq!(account.nonce, 0);
        assert!(account.balance.is_zero());
        assert!(!account.identity.approved);
        assert!(account.is_empty());
    }

    #[test]
    fn test_account_with_balance() {
        let account = Account::with_balance(Amount::from_u64(1000));
        assert_eq!(account.balance, Amount::from_u64(1000));
        assert!(!account.is_empty());
    }

    #[test]
    fn test_balance_operations() {
        let mut account = Account::new();

        account.add_balance(&Amount::from_u64(500));
        assert_eq!(account.balance, Amount::from_u64(500));

        account.sub_balance(&Amount::from_u64(200)).unwrap();
        assert_eq!(account.balance, Amount::from_u64(300));

        assert_eq!(
            account.sub_balance(&Amount::from_u64(400)),
            Err(VmError::InsufficientFunds {
                required: Amount::from_u64(400),
                available: Amount::from_u64(300),
            })
        );
        // failed debit leaves the balance alone
        assert_eq!(account.balance, Amount::from_u64(300));
    }

    #[test]
    fn test_approved_identity_is_not_empty() {
        let mut account = Account::new();
        account.identity.approve();
        assert!(!account.is_empty());
    }
}
