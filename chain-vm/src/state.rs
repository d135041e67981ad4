//! Account state with a committed base and a pending overlay
//!
//! Writes land in the overlay. `precommit` fixes the root the overlay would
//! produce, `commit` folds the overlay into the base and bumps the version,
//! and `reset` throws the overlay away. `for_check` hands out a disposable
//! copy that shares the committed base, so speculative execution never
//! touches canonical state.

use crate::account::Account;
use crate::{VmError, VmResult};
use chain_core::{keccak256, merkle_root, Address, Amount, Hash, Nonce};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// State database
#[derive(Debug, Clone, Default)]
pub struct StateDB {
    /// Committed accounts, shared with every `for_check` copy
    base: Arc<BTreeMap<Address, Account>>,
    /// Uncommitted writes
    pending: BTreeMap<Address, Account>,
    /// Root fixed by the last `precommit`
    precommitted: Option<Hash>,
    /// Number of commits so far
    version: u64,
}

impl StateDB {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Disposable copy of the committed state. Dropping it discards every
    /// write made through it.
    pub fn for_check(&self) -> StateDB {
        StateDB {
            base: Arc::clone(&self.base),
            pending: BTreeMap::new(),
            precommitted: None,
            version: self.version,
        }
    }

    /// Account at `address`, or the default account
    pub fn account(&self, address: &Address) -> Account {
        self.pending
            .get(address)
            .or_else(|| self.base.get(address))
            .cloned()
            .unwrap_or_default()
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.account(address).balance
    }

    pub fn nonce(&self, address: &Address) -> Nonce {
        self.account(address).nonce
    }

    pub fn is_approved(&self, address: &Address) -> bool {
        self.account(address).identity.approved
    }

    /// Write an account to the overlay
    pub fn set_account(&mut self, address: Address, account: Account) {
        self.precommitted = None;
        self.pending.insert(address, account);
    }

    pub fn add_balance(&mut self, address: &Address, amount: &Amount) {
        let mut account = self.account(address);
        account.add_balance(amount);
        self.set_account(*address, account);
    }

    pub fn sub_balance(&mut self, address: &Address, amount: &Amount) -> VmResult<()> {
        let mut account = self.account(address);
        account.sub_balance(amount)?;
        self.set_account(*address, account);
        Ok(())
    }

    pub fn set_nonce(&mut self, address: &Address, nonce: Nonce) {
        let mut account = self.account(address);
        account.nonce = nonce;
        self.set_account(*address, account);
    }

    pub fn approve_identity(&mut self, address: &Address) {
        let mut account = self.account(address);
        account.identity.approve();
        self.set_account(*address, account);
    }

    /// Whether there are uncommitted writes
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of commits applied to this state
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Root of the state including pending writes
    pub fn root(&self) -> VmResult<Hash> {
        if let Some(root) = self.precommitted {
            return Ok(root);
        }
        self.compute_root()
    }

    /// Root of the committed base only
    pub fn committed_root(&self) -> VmResult<Hash> {
        root_of(self.base.iter())
    }

    /// Fix the root of the pending writes without making them durable
    pub fn precommit(&mut self) -> VmResult<Hash> {
        let root = self.compute_root()?;
        self.precommitted = Some(root);
        Ok(root)
    }

    /// Fold pending writes into the committed base
    pub fn commit(&mut self) -> VmResult<(Hash, u64)> {
        let root = self.root()?;
        let pending = std::mem::take(&mut self.pending);
        let base = Arc::make_mut(&mut self.base);
        for (address, account) in pending {
            if account.is_empty() {
                base.remove(&address);
            } else {
                base.insert(address, account);
            }
        }
        self.precommitted = None;
        self.version += 1;
        debug!(root = %root, version = self.version, "Committed state");
        Ok((root, self.version))
    }

    /// Drop every pending write
    pub fn reset(&mut self) {
        self.pending.clear();
        self.precommitted = None;
    }

    fn compute_root(&self) -> VmResult<Hash> {
        let mut view: BTreeMap<&Address, &Account> = self.base.iter().collect();
        for (address, account) in &self.pending {
            view.insert(address, account);
        }
        root_of(view.into_iter())
    }
}

/// Merkle root over `address || bincode(account)` leaves in address order,
/// skipping default accounts.
fn root_of<'a>(accounts: impl Iterator<Item = (&'a Address, &'a Account)>) -> VmResult<Hash> {
    let mut leaves = Vec::new();
    for (address, account) in accounts {
        if account.is_empty() {
            continue;
        }
        let encoded = bincode::encode_to_vec(account, bincode::config::standard())
            .map_err(|e| VmError::State(format!("Failed to encode account: {}", e)))?;
        let mut leaf = Vec::with_capacity(20 + encoded.len());
        leaf.extend_from_slice(address.as_bytes());
        leaf.extend_from_slice(&encoded);
        leaves.push(keccak256(&leaf));
    }
    Ok(merkle_root(&leaves))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[test]
    fn test_empty_state_root_is_zero() {
        let state = StateDB::new();
        assert_eq!(state.root().unwrap(), Hash::zero());
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn test_writes_visible_before_commit() {
        let mut state = StateDB::new();
        state.add_balance(&addr(1), &Amount::from_u64(1000));
        assert_eq!(state.balance(&addr(1)), Amount::from_u64(1000));
        assert!(state.has_pending());
        assert_eq!(state.committed_root().unwrap(), Hash::zero());
        assert_ne!(state.root().unwrap(), Hash::zero());
    }

    #[test]
    fn test_commit_and_version() {
        let mut state = StateDB::new();
        state.add_balance(&addr(1), &Amount::from_u64(1000));
        let precommitted = state.precommit().unwrap();

        let (root, version) = state.commit().unwrap();
        assert_eq!(root, precommitted);
        assert_eq!(version, 1);
        assert!(!state.has_pending());
        assert_eq!(state.committed_root().unwrap(), root);
    }

    #[test]
    fn test_reset_discards_pending() {
        let mut state = StateDB::new();
        state.add_balance(&addr(1), &Amount::from_u64(1000));
        state.commit().unwrap();
        let root = state.root().unwrap();

        state.set_nonce(&addr(1), 5);
        state.approve_identity(&addr(2));
        state.reset();

        assert_eq!(state.nonce(&addr(1)), 0);
        assert!(!state.is_approved(&addr(2)));
        assert_eq!(state.root().unwrap(), root);
    }

    #[test]
    fn test_for_check_is_isolated() {
        let mut state = StateDB::new();
        state.add_balance(&addr(1), &Amount::from_u64(1000));
        state.commit().unwrap();
        let root = state.root().unwrap();

        let mut check = state.for_check();
        check.sub_balance(&addr(1), &Amount::from_u64(400)).unwrap();
        check.commit().unwrap();

        assert_eq!(check.balance(&addr(1)), Amount::from_u64(600));
        assert_eq!(state.balance(&addr(1)), Amount::from_u64(1000));
        assert_eq!(state.root().unwrap(), root);
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn test_root_is_order_independent() {
        let mut a = StateDB::new();
        a.add_balance(&addr(1), &Amount::from_u64(1));
        a.add_balance(&addr(2), &Amount::from_u64(2));

        let mut b = StateDB::new();
        b.add_balance(&addr(2), &Amount::from_u64(2));
        b.add_balance(&addr(1), &Amount::from_u64(1));

        assert_eq!(a.root().unwrap(), b.root().unwrap());
    }

    #[test]
    fn test_default_accounts_pruned() {
        let mut state = StateDB::new();
        state.add_balance(&addr(1), &Amount::from_u64(1));
        let root = state.root().unwrap();

        // touching an account without changing it leaves the root alone
        state.add_balance(&addr(2), &Amount::zero());
        assert_eq!(state.root().unwrap(), root);

        state.sub_balance(&addr(1), &Amount::from_u64(1)).unwrap();
        state.commit().unwrap();
        assert_eq!(state.root().unwrap(), Hash::zero());
    }

    #[test]
    fn test_precommit_invalidated_by_write() {
        let mut state = StateDB::new();
        let empty = state.precommit().unwrap();
        state.add_balance(&addr(1), &Amount::from_u64(1));
        assert_ne!(state.root().unwrap(), empty);
    }
}
