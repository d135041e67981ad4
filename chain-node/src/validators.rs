//! Fixed validator set

use crate::traits::ValidatorsCache;
use chain_core::{Address, Transaction, TxType};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Validator cache over a set that only grows through approvals
#[derive(Debug, Default)]
pub struct StaticValidators {
    validators: RwLock<BTreeSet<Address>>,
    refreshes: AtomicU64,
}

impl StaticValidators {
    pub fn new(validators: impl IntoIterator<Item = Address>) -> Self {
        Self {
            validators: RwLock::new(validators.into_iter().collect()),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.validators.read().contains(address)
    }

    pub fn len(&self) -> usize {
        self.validators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.read().is_empty()
    }

    /// How many times an applied block changed the set
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl ValidatorsCache for StaticValidators {
    fn refresh_if_updated(&self, transactions: &[Transaction]) {
        let approved: Vec<Address> = transactions
            .iter()
            .filter(|tx| tx.tx_type == TxType::Approving)
            .filter_map(|tx| tx.sender().ok())
            .collect();
        if approved.is_empty() {
            return;
        }

        let mut validators = self.validators.write();
        validators.extend(approved);
        let count = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;
        info!(validators = validators.len(), refresh = count, "Refreshed validators");
    }
}
