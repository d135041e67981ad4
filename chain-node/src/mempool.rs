//! FIFO in-memory transaction pool

use crate::traits::Mempool;
use chain_core::{Address, Block, Hash, Nonce, Transaction};
use chain_vm::{VmError, VmResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Default cap on transactions per proposed block
pub const DEFAULT_MAX_BLOCK_TXS: usize = 1000;

struct PoolEntry {
    hash: Hash,
    sender: Address,
    tx: Transaction,
}

/// Transactions in arrival order
pub struct TxPool {
    entries: Mutex<VecDeque<PoolEntry>>,
    max_block_txs: usize,
}

impl Default for TxPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_TXS)
    }
}

impl TxPool {
    pub fn new(max_block_txs: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_block_txs,
        }
    }

    /// Queue a signed transaction. Duplicates are ignored.
    pub fn add(&self, tx: Transaction) -> VmResult<Hash> {
        let sender = tx.sender().map_err(|_| VmError::InvalidSignature)?;
        let hash = tx.hash()?;

        let mut entries = self.entries.lock();
        if entries.iter().any(|entry| entry.hash == hash) {
            return Ok(hash);
        }
        entries.push_back(PoolEntry { hash, sender, tx });
        debug!(hash = %hash, sender = %sender, "Queued transaction");
        Ok(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Mempool for TxPool {
    fn build_block_transactions(&self) -> Vec<Transaction> {
        self.entries
            .lock()
            .iter()
            .take(self.max_block_txs)
            .map(|entry| entry.tx.clone())
            .collect()
    }

    fn reset_to(&self, block: &Block) {
        let mut included = HashSet::new();
        let mut last_nonce: HashMap<Address, Nonce> = HashMap::new();
        for tx in block.transactions() {
            if let Ok(hash) = tx.hash() {
                included.insert(hash);
            }
            if let Ok(sender) = tx.sender() {
                let nonce = last_nonce.entry(sender).or_insert(tx.nonce);
                *nonce = (*nonce).max(tx.nonce);
            }
        }

        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| {
            !included.contains(&entry.hash)
                && last_nonce
                    .get(&entry.sender)
                    .map_or(true, |nonce| entry.tx.nonce > *nonce)
        });
        debug!(
            height = block.height(),
            dropped = before - entries.len(),
            remaining = entries.len(),
            "Reset transaction pool"
        );
    }
}
