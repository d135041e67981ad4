//! Block data structures and operations
//!
//! A block is either proposed by an identified node (and carries
//! transactions) or an empty placeholder inserted when a finalized round
//! produced no proposal. The two header shapes are a sum type, so every
//! consumer has to say what it does with each.

use crate::{
    keccak256, Address, BlockNumber, CoreError, CoreResult, Hash, Network, Seed, Timestamp,
    Transaction,
};
use serde::{Deserialize, Serialize};

/// Domain separation constant for the genesis seed
pub const GENESIS_SEED_DOMAIN: [u8; 6] = [0x1, 0x2, 0x3, 0x4, 0x5, 0x6];

/// Height of the genesis block
pub const GENESIS_HEIGHT: BlockNumber = 1;

/// Header of a block built by an identified proposer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct ProposedHeader {
    /// Hash of the parent block
    pub parent_hash: Hash,
    /// Block height, parent height + 1
    pub height: BlockNumber,
    /// Proposal time in seconds
    pub time: Timestamp,
    /// Proposer's VRF public key bytes (empty for genesis)
    pub proposer_pub_key: Vec<u8>,
    /// Merkle commitment over the body's transactions
    pub tx_hash: Hash,
    /// Address credited with the block reward
    pub coinbase: Address,
    /// State root after applying the block
    pub root: Hash,
}

/// Header of a placeholder block: no proposer, no transactions, no time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct EmptyBlockHeader {
    pub parent_hash: Hash,
    pub height: BlockNumber,
    pub root: Hash,
}

/// Block header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub enum Header {
    Proposed(ProposedHeader),
    Empty(EmptyBlockHeader),
}

impl Header {
    pub fn parent_hash(&self) -> Hash {
        match self {
            Header::Proposed(h) => h.parent_hash,
            Header::Empty(h) => h.parent_hash,
        }
    }

    pub fn height(&self) -> BlockNumber {
        match self {
            Header::Proposed(h) => h.height,
            Header::Empty(h) => h.height,
        }
    }

    pub fn root(&self) -> Hash {
        match self {
            Header::Proposed(h) => h.root,
            Header::Empty(h) => h.root,
        }
    }

    /// Calculate the hash of this block header
    pub fn hash(&self) -> CoreResult<Hash> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))?;
        Ok(keccak256(&encoded))
    }
}

/// Block body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    /// Ordered transactions
    pub transactions: Vec<Transaction>,
    /// VRF output chained from the parent seed
    pub block_seed: Seed,
    /// VRF proof for `block_seed`; empty when no proposer evaluated it
    pub seed_proof: Vec<u8>,
}

/// Finality certificate for a block hash, produced by the consensus round
/// driver and stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCert {
    pub round: BlockNumber,
    pub signatures: Vec<Vec<u8>>,
}

/// Complete block with header and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub body: Body,
}

impl Block {
    /// Create a new block
    pub fn new(header: Header, body: Body) -> Self {
        Self { header, body }
    }

    /// Genesis block for `network` committing to the given state root
    pub fn genesis(network: Network, root: Hash) -> Self {
        let header = ProposedHeader {
            parent_hash: Hash::zero(),
            height: GENESIS_HEIGHT,
            time: 0,
            proposer_pub_key: Vec::new(),
            tx_hash: Hash::zero(),
            coinbase: Address::zero(),
            root,
        };
        Self {
            header: Header::Proposed(header),
            body: Body {
                transactions: Vec::new(),
                block_seed: genesis_seed(network),
                seed_proof: Vec::new(),
            },
        }
    }

    /// Get the block hash (same as header hash). Seed and proof are left
    /// out because the seed message itself contains this hash.
    pub fn hash(&self) -> CoreResult<Hash> {
        self.header.hash()
    }

    pub fn height(&self) -> BlockNumber {
        self.header.height()
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash()
    }

    pub fn root(&self) -> Hash {
        self.header.root()
    }

    pub fn seed(&self) -> &Seed {
        &self.body.block_seed
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.body.transactions
    }

    /// Whether this is a placeholder block
    pub fn is_empty(&self) -> bool {
        matches!(self.header, Header::Empty(_))
    }

    pub fn proposed_header(&self) -> Option<&ProposedHeader> {
        match &self.header {
            Header::Proposed(h) => Some(h),
            Header::Empty(_) => None,
        }
    }

    /// Calculate the transactions root hash
    pub fn calculate_transactions_root(&self) -> CoreResult<Hash> {
        Transaction::derive_root(&self.body.transactions)
    }

    /// Check if block is genesis
    pub fn is_genesis(&self) -> bool {
        self.height() == GENESIS_HEIGHT && self.parent_hash().is_zero()
    }
}

/// Seed of the genesis block: Keccak-256 over the domain constant and the
/// big-endian network id.
pub fn genesis_seed(network: Network) -> Seed {
    let mut data = GENESIS_SEED_DOMAIN.to_vec();
    data.extend_from_slice(&network.id().to_be_bytes());
    Seed::from(keccak256(&data))
}
