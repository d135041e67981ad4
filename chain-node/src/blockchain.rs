//! The blockchain component
//!
//! Owns the chain tip: the head block and the committed state it produced,
//! kept under one lock so readers always see a matching pair. Proposals and
//! validation run against disposable copies of the state; only `add_block`
//! moves the tip, one block at a time under the apply lock.

use crate::config::NodeConfig;
use crate::error::{ChainError, ChainResult, ParentMismatch};
use crate::traits::{Mempool, TxValidator, ValidatorsCache};
use chain_consensus::{
    block_seed_message, verify_block_seed, verify_proposer, ConsensusError, Sortition,
    SortitionResult, VrfKeypair,
};
use chain_core::{
    address_from_private_key, keccak256, Address, Amount, Block, BlockCert, BlockNumber, Body,
    EmptyBlockHeader, Hash, Header, Network, ProposedHeader, Seed, Transaction, GENESIS_HEIGHT,
};
use chain_db::{ChainRepository, SharedDatabase};
use chain_vm::{Account, ApplyMode, BlockExecutor, StateDB, VmError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Domain prefix for deriving the VRF secret from the identity key
const VRF_KEY_DOMAIN: &[u8] = b"chain.node.vrf-key";

/// Keys the node signs and proposes with
struct NodeIdentity {
    sortition: Sortition,
    coinbase: Address,
}

/// Head block and the committed state after it
#[derive(Default)]
struct ChainTip {
    head: Option<Arc<Block>>,
    state: StateDB,
}

/// Blockchain component
pub struct Blockchain {
    config: NodeConfig,
    repo: ChainRepository,
    executor: BlockExecutor,
    tip: RwLock<ChainTip>,
    identity: RwLock<Option<Arc<NodeIdentity>>>,
    apply_lock: Mutex<()>,
    mempool: Arc<dyn Mempool>,
    validators: Arc<dyn ValidatorsCache>,
    tx_validator: Arc<dyn TxValidator>,
}

impl Blockchain {
    pub fn new(
        config: NodeConfig,
        db: SharedDatabase,
        mempool: Arc<dyn Mempool>,
        validators: Arc<dyn ValidatorsCache>,
        tx_validator: Arc<dyn TxValidator>,
    ) -> ChainResult<Self> {
        config.validate()?;
        let executor = BlockExecutor::new(config.block_reward.clone(), Arc::new(config.fees.clone()));
        Ok(Self {
            config,
            repo: ChainRepository::new(db),
            executor,
            tip: RwLock::new(ChainTip::default()),
            identity: RwLock::new(None),
            apply_lock: Mutex::new(()),
            mempool,
            validators,
            tx_validator,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Set up the node identity from a secp256k1 secret key, then restore
    /// the stored chain or create genesis.
    pub fn initialize_chain(&self, identity_key: &[u8; 32]) -> ChainResult<Arc<Block>> {
        let coinbase = address_from_private_key(identity_key)?;
        let mut material = VRF_KEY_DOMAIN.to_vec();
        material.extend_from_slice(identity_key);
        let keypair = VrfKeypair::from_secret_bytes(keccak256(&material).as_bytes())?;
        let sortition = Sortition::new(keypair, self.config.consensus.proposer_threshold);
        *self.identity.write() = Some(Arc::new(NodeIdentity {
            sortition,
            coinbase,
        }));

        let head = match self.repo.read_head()? {
            Some(stored) => {
                let _guard = self.apply_lock.lock();
                let state = self.restore_state(&stored)?;
                let stored = Arc::new(stored);
                *self.tip.write() = ChainTip {
                    head: Some(Arc::clone(&stored)),
                    state,
                };
                stored
            }
            None => Arc::new(self.generate_genesis(self.config.network)?),
        };

        info!(
            height = head.height(),
            hash = %head.hash()?,
            coinbase = %coinbase,
            "Chain initialized"
        );
        Ok(head)
    }

    /// Current head snapshot
    pub fn head(&self) -> Option<Arc<Block>> {
        self.tip.read().head.clone()
    }

    fn require_head(&self) -> ChainResult<Arc<Block>> {
        self.head().ok_or(ChainError::NotInitialized)
    }

    /// Head and a disposable copy of its state, read under one guard
    fn snapshot(&self) -> ChainResult<(Arc<Block>, StateDB)> {
        let tip = self.tip.read();
        let head = tip.head.clone().ok_or(ChainError::NotInitialized)?;
        Ok((head, tip.state.for_check()))
    }

    fn require_identity(&self) -> ChainResult<Arc<NodeIdentity>> {
        self.identity.read().clone().ok_or(ChainError::NotInitialized)
    }

    /// Height of the block being decided next
    pub fn round(&self) -> ChainResult<BlockNumber> {
        Ok(self.require_head()?.height() + 1)
    }

    /// Committed state root
    pub fn state_root(&self) -> ChainResult<Hash> {
        Ok(self.tip.read().state.committed_root()?)
    }

    /// Number of commits the canonical state has gone through
    pub fn state_version(&self) -> u64 {
        self.tip.read().state.version()
    }

    pub fn account(&self, address: &Address) -> Account {
        self.tip.read().state.account(address)
    }

    pub fn coinbase(&self) -> Option<Address> {
        self.identity.read().as_ref().map(|identity| identity.coinbase)
    }

    /// VRF public key placed in this node's proposals
    pub fn vrf_public_key(&self) -> Option<[u8; 32]> {
        self.identity
            .read()
            .as_ref()
            .map(|identity| identity.sortition.public_key().to_bytes())
    }

    /// Commit the genesis allocations and store the genesis block
    pub fn generate_genesis(&self, network: Network) -> ChainResult<Block> {
        let _guard = self.apply_lock.lock();
        if self.head().is_some() || self.repo.read_head_hash()?.is_some() {
            return Err(ChainError::GenesisExists);
        }

        let mut state = StateDB::new();
        self.allocate_genesis(&mut state)?;
        let (root, version) = state.commit()?;

        let genesis = Block::genesis(network, root);
        let hash = self.repo.insert_block(&genesis)?;
        *self.tip.write() = ChainTip {
            head: Some(Arc::new(genesis.clone())),
            state,
        };
        info!(network = %network, hash = %hash, root = %root, version, "Generated genesis");
        Ok(genesis)
    }

    fn allocate_genesis(&self, state: &mut StateDB) -> ChainResult<()> {
        for (address, balance) in self.config.genesis.accounts()? {
            state.add_balance(&address, &balance);
        }
        Ok(())
    }

    /// Rebuild the canonical state by replaying stored blocks up to `head`
    fn restore_state(&self, head: &Block) -> ChainResult<StateDB> {
        let mut state = StateDB::new();
        self.allocate_genesis(&mut state)?;
        let (genesis_root, _) = state.commit()?;

        let genesis = self.canonical_block(GENESIS_HEIGHT)?;
        if genesis.root() != genesis_root {
            return Err(ChainError::CorruptedChain(format!(
                "genesis root {} does not match the configured allocations {}",
                genesis.root(),
                genesis_root
            )));
        }

        for height in (GENESIS_HEIGHT + 1)..=head.height() {
            let block = self.canonical_block(height)?;
            let outcome = self
                .executor
                .apply_block(&mut state, &block, ApplyMode::Canonical)
                .map_err(|e| {
                    ChainError::CorruptedChain(format!("replay of block {} failed: {}", height, e))
                })?;
            if outcome.root != block.root() {
                return Err(ChainError::CorruptedChain(format!(
                    "block {} commits to root {} but replay gives {}",
                    height,
                    block.root(),
                    outcome.root
                )));
            }
            state.commit()?;
        }

        debug!(height = head.height(), version = state.version(), "Restored state");
        Ok(state)
    }

    fn canonical_block(&self, height: BlockNumber) -> ChainResult<Block> {
        let hash = self.repo.read_canonical_hash(height)?.ok_or_else(|| {
            ChainError::CorruptedChain(format!("no canonical block at height {}", height))
        })?;
        self.repo.read_block(&hash)?.ok_or_else(|| {
            ChainError::CorruptedChain(format!("canonical block {} is missing", hash))
        })
    }

    /// Placeholder for a round that produced no proposal
    pub fn generate_empty_block(&self) -> ChainResult<Block> {
        let (head, state) = self.snapshot()?;
        Self::empty_block_on(&head, &state)
    }

    fn empty_block_on(head: &Block, state: &StateDB) -> ChainResult<Block> {
        let header = EmptyBlockHeader {
            parent_hash: head.hash()?,
            height: head.height() + 1,
            root: state.committed_root()?,
        };
        let mut block = Block::new(Header::Empty(header), Body::default());
        let message = block_seed_message(head.seed(), block.height(), &block.hash()?);
        block.body.block_seed = Seed::from(keccak256(&message));
        Ok(block)
    }

    /// Evaluate this node's proposer sortition for the current round
    pub fn proposer_sortition(&self) -> ChainResult<SortitionResult> {
        let identity = self.require_identity()?;
        let head = self.require_head()?;
        Ok(identity.sortition.proposer(head.seed(), head.height()))
    }

    /// Build a block on the current head.
    ///
    /// `proof` and `output` must be this node's winning proposer sortition
    /// for the round. Execution happens on a disposable state copy.
    pub fn propose_block(&self, proof: &[u8], output: &Hash) -> ChainResult<Block> {
        let identity = self.require_identity()?;
        let (head, mut check) = self.snapshot()?;
        let public_key = identity.sortition.public_key().to_bytes();

        verify_proposer(
            &public_key,
            head.seed(),
            head.height(),
            output,
            proof,
            identity.sortition.threshold(),
        )
        .map_err(|e| ChainError::NotProposer(e.to_string()))?;

        let transactions = self.mempool.build_block_transactions();
        let header = ProposedHeader {
            parent_hash: head.hash()?,
            height: head.height() + 1,
            time: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
            proposer_pub_key: public_key.to_vec(),
            tx_hash: Transaction::derive_root(&transactions)?,
            coinbase: identity.coinbase,
            root: Hash::zero(),
        };
        let mut block = Block::new(
            Header::Proposed(header),
            Body {
                transactions,
                ..Body::default()
            },
        );

        let outcome = self
            .executor
            .apply_block(&mut check, &block, ApplyMode::Speculative)?;
        if let Header::Proposed(header) = &mut block.header {
            header.root = outcome.root;
        }

        let hash = block.hash()?;
        let (seed, seed_proof) = identity.sortition.block_seed(head.seed(), block.height(), &hash);
        block.body.block_seed = seed;
        block.body.seed_proof = seed_proof;

        debug!(
            height = block.height(),
            hash = %hash,
            txs = outcome.applied,
            root = %outcome.root,
            "Proposed block"
        );
        Ok(block)
    }

    /// Check another node's proposer proof for the current round
    pub fn validate_proposer_proof(
        &self,
        proof: &[u8],
        output: &Hash,
        public_key: &[u8],
    ) -> ChainResult<()> {
        let head = self.require_head()?;
        verify_proposer(
            public_key,
            head.seed(),
            head.height(),
            output,
            proof,
            self.config.consensus.proposer_threshold,
        )?;
        Ok(())
    }

    /// Structural and cryptographic checks of a proposed block against the
    /// current head. Execution is left to `add_block`.
    pub fn validate_proposed_block(&self, block: &Block) -> ChainResult<()> {
        let (head, state) = self.snapshot()?;
        self.validate_against(&head, &state, block)
    }

    fn validate_parent(head: &Block, block: &Block) -> ChainResult<()> {
        let expected = head.height() + 1;
        if block.height() != expected {
            return Err(ChainError::InvalidParent(ParentMismatch::Height {
                expected,
                actual: block.height(),
            }));
        }
        let head_hash = head.hash()?;
        if block.parent_hash() != head_hash {
            return Err(ChainError::InvalidParent(ParentMismatch::Hash {
                expected: head_hash,
                actual: block.parent_hash(),
            }));
        }
        Ok(())
    }

    fn validate_against(&self, head: &Block, state: &StateDB, block: &Block) -> ChainResult<()> {
        Self::validate_parent(head, block)?;

        let header = block.proposed_header().ok_or_else(|| {
            ChainError::InvalidEmptyBlock("expected a proposed block".to_string())
        })?;

        verify_block_seed(
            &header.proposer_pub_key,
            head.seed(),
            block.height(),
            &block.hash()?,
            block.seed(),
            &block.body.seed_proof,
        )
        .map_err(|e| match e {
            ConsensusError::InvalidPublicKey(_) | ConsensusError::MalformedProof(_) => {
                ChainError::Consensus(e)
            }
            other => ChainError::InvalidSeed(other.to_string()),
        })?;

        let tx_hash = block.calculate_transactions_root()?;
        if tx_hash != header.tx_hash {
            return Err(ChainError::InvalidTxHash {
                expected: header.tx_hash,
                actual: tx_hash,
            });
        }

        for (index, tx) in block.transactions().iter().enumerate() {
            self.tx_validator
                .validate_tx(state, tx)
                .map_err(|source| ChainError::InvalidTransaction { index, source })?;
        }

        debug!(height = block.height(), "Validated proposed block");
        Ok(())
    }

    /// Validate, apply and append a block on the current head
    pub fn add_block(&self, block: Block) -> ChainResult<()> {
        let _guard = self.apply_lock.lock();
        let (head, state) = self.snapshot()?;

        let result = match block.header {
            Header::Empty(_) => self.add_empty_block(&head, state, block),
            Header::Proposed(_) => self.add_proposed_block(&head, state, block),
        };
        if let Err(err) = &result {
            warn!(round = head.height() + 1, error = %err, kind = ?err.kind(), "Rejected block");
        }
        result
    }

    fn add_empty_block(&self, head: &Block, state: StateDB, block: Block) -> ChainResult<()> {
        Self::validate_parent(head, &block)?;
        let expected = Self::empty_block_on(head, &state)?;

        if block.root() != expected.root() {
            return Err(ChainError::Transition(VmError::StateRootMismatch {
                expected: block.root(),
                actual: expected.root(),
            }));
        }
        if block.seed() != expected.seed() {
            return Err(ChainError::InvalidSeed(format!(
                "empty block seed {} differs from {}",
                block.seed(),
                expected.seed()
            )));
        }
        if !block.transactions().is_empty() || !block.body.seed_proof.is_empty() {
            return Err(ChainError::InvalidEmptyBlock(
                "empty block carries transactions or a seed proof".to_string(),
            ));
        }

        self.append(expected, state, Amount::zero())
    }

    fn add_proposed_block(
        &self,
        head: &Block,
        mut state: StateDB,
        block: Block,
    ) -> ChainResult<()> {
        self.validate_against(head, &state, &block)?;
        let outcome = self
            .executor
            .apply_block(&mut state, &block, ApplyMode::Canonical)?;
        debug!(
            height = block.height(),
            txs = outcome.applied,
            burned = %outcome.burned_fee,
            "Executed block"
        );
        self.append(block, state, outcome.proposer_reward)
    }

    /// Store `block`, then publish it with the state it produced as the new
    /// tip and notify the collaborators. Nothing is visible to readers if the
    /// store fails.
    fn append(&self, block: Block, state: StateDB, reward: Amount) -> ChainResult<()> {
        let hash = self.repo.insert_block(&block)?;
        let block = Arc::new(block);

        let (root, version) = {
            let mut tip = self.tip.write();
            // replaced before commit so the base is no longer shared
            tip.state = state;
            match tip.state.commit() {
                Ok(committed) => {
                    tip.head = Some(Arc::clone(&block));
                    committed
                }
                Err(err) => {
                    tip.state.reset();
                    return Err(err.into());
                }
            }
        };

        self.mempool.reset_to(&block);
        self.validators.refresh_if_updated(block.transactions());

        info!(
            height = block.height(),
            hash = %hash,
            root = %root,
            version,
            empty = block.is_empty(),
            reward = %reward,
            "Appended block"
        );
        Ok(())
    }

    /// Record that consensus finalized `hash`, with its certificate
    pub fn write_final_consensus(&self, hash: &Hash, cert: &BlockCert) -> ChainResult<()> {
        self.repo.write_final_consensus(hash)?;
        self.repo.write_cert(hash, cert)?;
        debug!(hash = %hash, round = cert.round, "Wrote final consensus");
        Ok(())
    }

    pub fn is_final(&self, hash: &Hash) -> ChainResult<bool> {
        Ok(self.repo.is_final(hash)?)
    }

    pub fn block(&self, hash: &Hash) -> ChainResult<Option<Block>> {
        Ok(self.repo.read_block(hash)?)
    }

    pub fn block_by_height(&self, height: BlockNumber) -> ChainResult<Option<Block>> {
        match self.repo.read_canonical_hash(height)? {
            Some(hash) => self.block(&hash),
            None => Ok(None),
        }
    }
}
