//! Chain repository: blocks, canonical index, head pointer and finality
//!
//! Values are stored as JSON. Heights are keyed big-endian so the canonical
//! index sorts by height.

use crate::column_families::ColumnFamily;
use crate::traits::{DbTx, SharedDatabase};
use crate::{DbError, DbResult};
use chain_core::{Block, BlockCert, BlockNumber, Hash};
use tracing::debug;

const HEAD_KEY: &[u8] = b"head";
const FINAL_MARK: &[u8] = &[0x1];

/// Typed access to chain data in a `KeyValueDB`
#[derive(Clone)]
pub struct ChainRepository {
    db: SharedDatabase,
}

impl std::fmt::Debug for ChainRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRepository").finish_non_exhaustive()
    }
}

impl ChainRepository {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Start a write batch
    pub fn begin(&self) -> Box<dyn DbTx> {
        self.db.transaction()
    }

    pub fn read_block(&self, hash: &Hash) -> DbResult<Option<Block>> {
        match self.db.get(ColumnFamily::Blocks.name(), hash.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write a block keyed by its hash, returning the hash
    pub fn write_block(&self, tx: &mut dyn DbTx, block: &Block) -> DbResult<Hash> {
        let hash = block.hash()?;
        let bytes = serde_json::to_vec(block)?;
        tx.put(ColumnFamily::Blocks.name(), hash.as_bytes(), &bytes)?;
        Ok(hash)
    }

    pub fn read_canonical_hash(&self, height: BlockNumber) -> DbResult<Option<Hash>> {
        self.db
            .get(ColumnFamily::Canonical.name(), &height.to_be_bytes())?
            .map(|bytes| decode_hash(&bytes))
            .transpose()
    }

    pub fn write_canonical_hash(
        &self,
        tx: &mut dyn DbTx,
        height: BlockNumber,
        hash: &Hash,
    ) -> DbResult<()> {
        tx.put(
            ColumnFamily::Canonical.name(),
            &height.to_be_bytes(),
            hash.as_bytes(),
        )
    }

    pub fn read_head_hash(&self) -> DbResult<Option<Hash>> {
        self.db
            .get(ColumnFamily::Meta.name(), HEAD_KEY)?
            .map(|bytes| decode_hash(&bytes))
            .transpose()
    }

    /// Block the head pointer refers to. A pointer to a missing block is
    /// corrupt data, not an empty chain.
    pub fn read_head(&self) -> DbResult<Option<Block>> {
        let Some(hash) = self.read_head_hash()? else {
            return Ok(None);
        };
        self.read_block(&hash)?
            .map(Some)
            .ok_or_else(|| DbError::InvalidData(format!("head block {} is missing", hash)))
    }

    pub fn write_head(&self, tx: &mut dyn DbTx, hash: &Hash) -> DbResult<()> {
        tx.put(ColumnFamily::Meta.name(), HEAD_KEY, hash.as_bytes())
    }

    /// Store a block, index it as canonical and move the head to it in one
    /// batch
    pub fn insert_block(&self, block: &Block) -> DbResult<Hash> {
        let mut tx = self.begin();
        let hash = self.write_block(tx.as_mut(), block)?;
        self.write_canonical_hash(tx.as_mut(), block.height(), &hash)?;
        self.write_head(tx.as_mut(), &hash)?;
        tx.commit()?;
        debug!(height = block.height(), hash = %hash, "Stored block");
        Ok(hash)
    }

    pub fn write_final_consensus(&self, hash: &Hash) -> DbResult<()> {
        self.db
            .put(ColumnFamily::Final.name(), hash.as_bytes(), FINAL_MARK)
    }

    pub fn is_final(&self, hash: &Hash) -> DbResult<bool> {
        self.db.exists(ColumnFamily::Final.name(), hash.as_bytes())
    }

    pub fn write_cert(&self, hash: &Hash, cert: &BlockCert) -> DbResult<()> {
        let bytes = serde_json::to_vec(cert)?;
        self.db
            .put(ColumnFamily::Certs.name(), hash.as_bytes(), &bytes)
    }

    pub fn read_cert(&self, hash: &Hash) -> DbResult<Option<BlockCert>> {
        match self.db.get(ColumnFamily::Certs.name(), hash.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

fn decode_hash(bytes: &[u8]) -> DbResult<Hash> {
    if bytes.len() != 32 {
        return Err(DbError::InvalidData(format!(
            "expected 32-byte hash, got {} bytes",
            bytes.len()
        )));
    }
    Ok(Hash::from_slice(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;
    use crate::traits::KeyValueDB;
    use chain_core::Network;
    use std::sync::Arc;

    fn repository() -> (ChainRepository, Arc<MemoryDatabase>) {
        let db = Arc::new(MemoryDatabase::new());
        (ChainRepository::new(db.clone()), db)
    }

    #[test]
    fn test_empty_repository() {
        let (repo, _) = repository();
        assert!(repo.read_head().unwrap().is_none());
        assert!(repo.read_canonical_hash(1).unwrap().is_none());
        assert!(repo.read_block(&Hash::zero()).unwrap().is_none());
    }

    #[test]
    fn test_insert_block() {
        let (repo, _) = repository();
        let genesis = Block::genesis(Network::Testnet, Hash::new([4u8; 32]));

        let hash = repo.insert_block(&genesis).unwrap();
        assert_eq!(hash, genesis.hash().unwrap());
        assert_eq!(repo.read_block(&hash).unwrap(), Some(genesis.clone()));
        assert_eq!(repo.read_canonical_hash(1).unwrap(), Some(hash));
        assert_eq!(repo.read_head().unwrap(), Some(genesis));
    }

    #[test]
    fn test_dangling_head_is_an_error() {
        let (repo, db) = repository();
        db.put("meta", b"head", &[9u8; 32]).unwrap();
        assert!(matches!(repo.read_head(), Err(DbError::InvalidData(_))));

        db.put("meta", b"head", &[9u8; 3]).unwrap();
        assert!(matches!(repo.read_head_hash(), Err(DbError::InvalidData(_))));
    }

    #[test]
    fn test_finality_and_certs() {
        let (repo, _) = repository();
        let hash = Hash::new([1u8; 32]);
        assert!(!repo.is_final(&hash).unwrap());
        assert!(repo.read_cert(&hash).unwrap().is_none());

        let cert = BlockCert {
            round: 3,
            signatures: vec![vec![1, 2], vec![3]],
        };
        repo.write_final_consensus(&hash).unwrap();
        repo.write_cert(&hash, &cert).unwrap();

        assert!(repo.is_final(&hash).unwrap());
        assert_eq!(repo.read_cert(&hash).unwrap(), Some(cert));
    }
}
