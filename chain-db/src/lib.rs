//! Blockchain database layer
//!
//! This crate provides the key-value facade the node persists its chain
//! through, an in-memory backend, and the repository that maps blocks,
//! the canonical index, the head pointer, finality marks and certificates
//! onto column families.

pub mod column_families;
pub mod error;
pub mod memory;
pub mod repository;
pub mod traits;

pub use column_families::ColumnFamily;
pub use error::{DbError, DbResult};
pub use memory::MemoryDatabase;
pub use repository::ChainRepository;
pub use traits::{DbTx, KeyValueDB, Operation, SharedDatabase};
