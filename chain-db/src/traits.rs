//! Database traits and interfaces

use crate::DbResult;
use std::sync::Arc;

/// Key-value database trait
pub trait KeyValueDB: Send + Sync {
    /// Get value by key from a column family
    fn get(&self, cf: &str, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Put key-value pair into a column family
    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Delete key from a column family
    fn delete(&self, cf: &str, key: &[u8]) -> DbResult<()>;

    /// Check if key exists in a column family
    fn exists(&self, cf: &str, key: &[u8]) -> DbResult<bool> {
        Ok(self.get(cf, key)?.is_some())
    }

    /// Create a new transaction
    fn transaction(&self) -> Box<dyn DbTx>;
}

/// Database transaction trait
///
/// Writes are buffered and become visible to other readers all at once on
/// `commit`. Reads through the transaction see its own buffered writes.
pub trait DbTx: Send {
    /// Get value by key from a column family
    fn get(&self, cf: &str, key: &[u8]) -> DbResult<Option<Vec<u8>>>;

    /// Put key-value pair into a column family
    fn put(&mut self, cf: &str, key: &[u8], value: &[u8]) -> DbResult<()>;

    /// Delete key from a column family
    fn delete(&mut self, cf: &str, key: &[u8]) -> DbResult<()>;

    /// Commit the transaction
    fn commit(self: Box<Self>) -> DbResult<()>;

    /// Rollback the transaction
    fn rollback(self: Box<Self>) -> DbResult<()>;
}

/// Shared database reference
pub type SharedDatabase = Arc<dyn KeyValueDB>;

/// Buffered database operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Put {
        cf: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: String,
        key: Vec<u8>,
    },
}
