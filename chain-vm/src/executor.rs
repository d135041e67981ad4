//! Block execution engine
//!
//! Applies a block's transactions in order, then credits the coinbase with
//! the block reward and its share of the collected fees. The same routine
//! serves the proposer (which needs the resulting root for its header) and
//! followers (which check the header's root against it).

use crate::fee::FeeModel;
use crate::state::StateDB;
use crate::{VmError, VmResult};
use chain_core::{Amount, Block, Hash, Transaction, TxType};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether the header root is produced or checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Proposer path: the computed root is returned for the header
    Speculative,
    /// Follower path: the computed root must equal the header root
    Canonical,
}

/// Summary of a block application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// State root after the block
    pub root: Hash,
    /// Fees collected from the block's transactions
    pub total_fee: Amount,
    /// Reward plus fee share credited to the coinbase
    pub proposer_reward: Amount,
    /// Fees credited to nobody
    pub burned_fee: Amount,
    /// Number of transactions applied
    pub applied: usize,
}

/// Applies blocks to a state
#[derive(Clone)]
pub struct BlockExecutor {
    block_reward: Amount,
    fees: Arc<dyn FeeModel>,
}

impl std::fmt::Debug for BlockExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockExecutor")
            .field("block_reward", &self.block_reward)
            .finish_non_exhaustive()
    }
}

impl BlockExecutor {
    pub fn new(block_reward: Amount, fees: Arc<dyn FeeModel>) -> Self {
        Self { block_reward, fees }
    }

    pub fn block_reward(&self) -> &Amount {
        &self.block_reward
    }

    pub fn fee_model(&self) -> &dyn FeeModel {
        self.fees.as_ref()
    }

    /// Apply `block` to `state` and fix the resulting root.
    ///
    /// Pending writes stay in `state` on success so the caller can commit
    /// them. On any error every pending write is discarded.
    pub fn apply_block(
        &self,
        state: &mut StateDB,
        block: &Block,
        mode: ApplyMode,
    ) -> VmResult<BlockOutcome> {
        let result = self.apply_inner(state, block, mode);
        if let Err(err) = &result {
            warn!(height = block.height(), error = %err, "Block application failed, state reset");
            state.reset();
        }
        result
    }

    fn apply_inner(
        &self,
        state: &mut StateDB,
        block: &Block,
        mode: ApplyMode,
    ) -> VmResult<BlockOutcome> {
        let header = match block.proposed_header() {
            Some(header) => header,
            None => {
                // placeholder blocks change nothing
                let root = state.precommit()?;
                return Ok(BlockOutcome {
                    root,
                    total_fee: Amount::zero(),
                    proposer_reward: Amount::zero(),
                    burned_fee: Amount::zero(),
                    applied: 0,
                });
            }
        };

        let mut total_fee = Amount::zero();
        for tx in block.transactions() {
            let fee = self.apply_transaction(state, tx)?;
            total_fee += &fee;
        }

        let fee_share = self.fees.proposer_share(&total_fee)?;
        let burned_fee = total_fee.checked_sub(&fee_share).ok_or_else(|| {
            VmError::Fee(format!(
                "Proposer share {} exceeds collected fees {}",
                fee_share, total_fee
            ))
        })?;
        let proposer_reward = &self.block_reward + &fee_share;
        state.add_balance(&header.coinbase, &proposer_reward);

        let root = state.precommit()?;
        if mode == ApplyMode::Canonical && root != header.root {
            return Err(VmError::StateRootMismatch {
                expected: header.root,
                actual: root,
            });
        }

        debug!(
            height = header.height,
            root = %root,
            txs = block.transactions().len(),
            fee = %total_fee,
            ?mode,
            "Applied block"
        );

        Ok(BlockOutcome {
            root,
            total_fee,
            proposer_reward,
            burned_fee,
            applied: block.transactions().len(),
        })
    }

    /// Apply a single transaction and return the fee it paid
    pub fn apply_transaction(&self, state: &mut StateDB, tx: &Transaction) -> VmResult<Amount> {
        let sender = tx.sender().map_err(|_| VmError::InvalidSignature)?;

        let expected = state.nonce(&sender) + 1;
        if tx.nonce != expected {
            return Err(VmError::InvalidNonce {
                expected,
                actual: tx.nonce,
            });
        }

        let fee = self.fees.tx_fee(tx);
        let paid = match tx.tx_type {
            TxType::Approving => {
                state.approve_identity(&sender);
                Amount::zero()
            }
            TxType::Send => {
                let to = tx.to.ok_or(VmError::MissingRecipient)?;
                let required = &tx.amount + &fee;
                let available = state.balance(&sender);
                if available < required {
                    return Err(VmError::InsufficientFunds {
                        required,
                        available,
                    });
                }
                state.sub_balance(&sender, &required)?;
                state.add_balance(&to, &tx.amount);
                fee
            }
            TxType::SendInvite => Amount::zero(),
        };

        state.set_nonce(&sender, tx.nonce);
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::FeeSchedule;
    use chain_core::{
        address_from_private_key, Address, Body, EmptyBlockHeader, Header, ProposedHeader, Seed,
    };

    const ALICE_KEY: [u8; 32] = [0x11; 32];

    fn alice() -> Address {
        address_from_private_key(&ALICE_KEY).unwrap()
    }

    fn coinbase() -> Address {
        Address::new([0xcc; 20])
    }

    fn executor(fee: u64) -> BlockExecutor {
        let schedule = FeeSchedule {
            fixed_fee: Amount::from_u64(fee),
            ..FeeSchedule::default()
        };
        BlockExecutor::new(Amount::from_u64(100), Arc::new(schedule))
    }

    fn funded_state(balance: u64) -> StateDB {
        let mut state = StateDB::new();
        state.add_balance(&alice(), &Amount::from_u64(balance));
        state.commit().unwrap();
        state
    }

    fn block(transactions: Vec<Transaction>, root: Hash) -> Block {
        Block::new(
            Header::Proposed(ProposedHeader {
                parent_hash: Hash::new([1u8; 32]),
                height: 2,
                time: 0,
                proposer_pub_key: vec![],
                tx_hash: Transaction::derive_root(&transactions).unwrap(),
                coinbase: coinbase(),
                root,
            }),
            Body {
                transactions,
                block_seed: Seed::default(),
                seed_proof: vec![],
            },
        )
    }

    fn send(nonce: u64, amount: u64) -> Transaction {
        Transaction::send(nonce, Address::new([0xbb; 20]), Amount::from_u64(amount))
            .signed(&ALICE_KEY)
            .unwrap()
    }

    #[test]
    fn test_transfer_and_reward() {
        let executor = executor(4);
        let mut state = funded_state(1000);

        let outcome = executor
            .apply_block(&mut state, &block(vec![send(1, 100)], Hash::zero()), ApplyMode::Speculative)
            .unwrap();

        assert_eq!(state.balance(&alice()), Amount::from_u64(896));
        assert_eq!(state.balance(&Address::new([0xbb; 20])), Amount::from_u64(100));
        // reward 100 plus half the fee of 4
        assert_eq!(state.balance(&coinbase()), Amount::from_u64(102));
        assert_eq!(state.nonce(&alice()), 1);
        assert_eq!(outcome.total_fee, Amount::from_u64(4));
        assert_eq!(outcome.burned_fee, Amount::from_u64(2));
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.root, state.root().unwrap());
    }

    #[test]
    fn test_canonical_root_check() {
        let executor = executor(0);
        let base = funded_state(1000);

        let mut speculative = base.for_check();
        let root = executor
            .apply_block(&mut speculative, &block(vec![send(1, 10)], Hash::zero()), ApplyMode::Speculative)
            .unwrap()
            .root;

        let mut canonical = base.for_check();
        executor
            .apply_block(&mut canonical, &block(vec![send(1, 10)], root), ApplyMode::Canonical)
            .unwrap();

        let mut wrong = base.for_check();
        let err = executor
            .apply_block(&mut wrong, &block(vec![send(1, 10)], Hash::new([7u8; 32])), ApplyMode::Canonical)
            .unwrap_err();
        assert_eq!(
            err,
            VmError::StateRootMismatch {
                expected: Hash::new([7u8; 32]),
                actual: root,
            }
        );
        assert!(!wrong.has_pending());
    }

    #[test]
    fn test_nonce_must_advance_by_one() {
        let executor = executor(0);

        for bad in [0u64, 2] {
            let mut state = funded_state(1000);
            let err = executor
                .apply_block(&mut state, &block(vec![send(bad, 1)], Hash::zero()), ApplyMode::Speculative)
                .unwrap_err();
            assert_eq!(err, VmError::InvalidNonce { expected: 1, actual: bad });
            assert!(!state.has_pending());
        }

        let mut state = funded_state(1000);
        executor
            .apply_block(
                &mut state,
                &block(vec![send(1, 1), send(2, 1)], Hash::zero()),
                ApplyMode::Speculative,
            )
            .unwrap();
        assert_eq!(state.nonce(&alice()), 2);
    }

    #[test]
    fn test_insufficient_funds_boundary() {
        let executor = executor(5);

        // exactly amount + fee succeeds
        let mut state = funded_state(105);
        executor
            .apply_block(&mut state, &block(vec![send(1, 100)], Hash::zero()), ApplyMode::Speculative)
            .unwrap();
        assert!(state.balance(&alice()).is_zero());

        // one short fails with nothing applied
        let mut state = funded_state(104);
        let err = executor
            .apply_block(&mut state, &block(vec![send(1, 100)], Hash::zero()), ApplyMode::Speculative)
            .unwrap_err();
        assert_eq!(
            err,
            VmError::InsufficientFunds {
                required: Amount::from_u64(105),
                available: Amount::from_u64(104),
            }
        );
        assert_eq!(state.balance(&alice()), Amount::from_u64(104));
        assert!(!state.has_pending());
    }

    #[test]
    fn test_approving_and_invite() {
        let executor = executor(5);
        let mut state = funded_state(10);
        let invite = Transaction::send_invite(2, Address::new([0xbb; 20]))
            .signed(&ALICE_KEY)
            .unwrap();
        let approve = Transaction::approving(1).signed(&ALICE_KEY).unwrap();

        let outcome = executor
            .apply_block(&mut state, &block(vec![approve, invite], Hash::zero()), ApplyMode::Speculative)
            .unwrap();
        assert!(state.is_approved(&alice()));
        assert_eq!(state.nonce(&alice()), 2);
        assert_eq!(state.balance(&alice()), Amount::from_u64(10));
        assert!(outcome.total_fee.is_zero());
    }

    #[test]
    fn test_unsigned_and_recipientless_rejected() {
        let executor = executor(0);

        let mut state = funded_state(10);
        let unsigned = Transaction::send(1, Address::new([0xbb; 20]), Amount::from_u64(1));
        assert_eq!(
            executor.apply_transaction(&mut state, &unsigned),
            Err(VmError::InvalidSignature)
        );

        let mut no_recipient = Transaction::new(1, TxType::Send, None, Amount::from_u64(1));
        no_recipient.sign(&ALICE_KEY).unwrap();
        assert_eq!(
            executor.apply_transaction(&mut state, &no_recipient),
            Err(VmError::MissingRecipient)
        );
    }

    #[test]
    fn test_empty_block_changes_nothing() {
        let executor = executor(0);
        let mut state = funded_state(10);
        let root = state.root().unwrap();
        let empty = Block::new(
            Header::Empty(EmptyBlockHeader {
                parent_hash: Hash::zero(),
                height: 2,
                root,
            }),
            Body::default(),
        );

        let outcome = executor
            .apply_block(&mut state, &empty, ApplyMode::Canonical)
            .unwrap();
        assert_eq!(outcome.root, root);
        assert!(outcome.proposer_reward.is_zero());
        assert!(!state.has_pending());
    }

    #[test]
    fn test_deterministic_root() {
        let executor = executor(3);
        let base = funded_state(1000);
        let txs = vec![send(1, 10), send(2, 20)];

        let mut a = base.for_check();
        let mut b = base.for_check();
        let ra = executor
            .apply_block(&mut a, &block(txs.clone(), Hash::zero()), ApplyMode::Speculative)
            .unwrap();
        let rb = executor
            .apply_block(&mut b, &block(txs, Hash::zero()), ApplyMode::Speculative)
            .unwrap();
        assert_eq!(ra, rb);
    }
}
