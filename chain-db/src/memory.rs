//! In-memory `KeyValueDB` backend

use crate::column_families::ColumnFamily;
use crate::traits::{DbTx, KeyValueDB, Operation};
use crate::{DbError, DbResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Tables = HashMap<String, HashMap<Vec<u8>, Vec<u8>>>;

/// Key-value store held in process memory, one map per column family
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDatabase {
    /// Create a database with every chain column family
    pub fn new() -> Self {
        let tables = ColumnFamily::all()
            .iter()
            .map(|cf| (cf.name().to_string(), HashMap::new()))
            .collect();
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Number of keys in a column family
    pub fn key_count(&self, cf: &str) -> DbResult<usize> {
        let tables = self.tables.read();
        tables
            .get(cf)
            .map(HashMap::len)
            .ok_or_else(|| DbError::UnknownColumnFamily(cf.to_string()))
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn table<'a>(tables: &'a Tables, cf: &str) -> DbResult<&'a HashMap<Vec<u8>, Vec<u8>>> {
    tables
        .get(cf)
        .ok_or_else(|| DbError::UnknownColumnFamily(cf.to_string()))
}

fn table_mut<'a>(tables: &'a mut Tables, cf: &str) -> DbResult<&'a mut HashMap<Vec<u8>, Vec<u8>>> {
    tables
        .get_mut(cf)
        .ok_or_else(|| DbError::UnknownColumnFamily(cf.to_string()))
}

impl KeyValueDB for MemoryDatabase {
    fn get(&self, cf: &str, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        let tables = self.tables.read();
        Ok(table(&tables, cf)?.get(key).cloned())
    }

    fn put(&self, cf: &str, key: &[u8], value: &[u8]) -> DbResult<()> {
        let mut tables = self.tables.write();
        table_mut(&mut tables, cf)?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf: &str, key: &[u8]) -> DbResult<()> {
        let mut tables = self.tables.write();
        table_mut(&mut tables, cf)?.remove(key);
        Ok(())
    }

    fn transaction(&self) -> Box<dyn DbTx> {
        Box::new(MemoryTx {
            tables: Arc::clone(&self.tables),
            operations: Vec::new(),
        })
    }
}

/// Buffered write batch over a `MemoryDatabase`
struct MemoryTx {
    tables: Arc<RwLock<Tables>>,
    operations: Vec<Operation>,
}

impl DbTx for MemoryTx {
    fn get(&self, cf: &str, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        // latest buffered write wins
        for op in self.operations.iter().rev() {
            match op {
                Operation::Put { cf: c, key: k, value } if c == cf && k == key => {
                    return Ok(Some(value.clone()));
                }
                Operation::Delete { cf: c, key: k } if c == cf && k == key => return Ok(None),
                _ => {}
            }
        }
        let tables = self.tables.read();
        Ok(table(&tables, cf)?.get(key).cloned())
    }

    fn put(&mut self, cf: &str, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.operations.push(Operation::Put {
            cf: cf.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn delete(&mut self, cf: &str, key: &[u8]) -> DbResult<()> {
        self.operations.push(Operation::Delete {
            cf: cf.to_string(),
            key: key.to_vec(),
        });
        Ok(())
    }

    fn commit(self: Box<Self>) -> DbResult<()> {
        let MemoryTx { tables, operations } = *self;
        let mut tables = tables.write();
        // check every column family before touching anything
        for op in &operations {
            let cf = match op {
                Operation::Put { cf, .. } | Operation::Delete { cf, .. } => cf,
            };
            if !tables.contains_key(cf) {
                return Err(DbError::Transaction(format!(
                    "Unknown column family in batch: {}",
                    cf
                )));
            }
        }
        for op in operations {
            match op {
                Operation::Put { cf, key, value } => {
                    table_mut(&mut tables, &cf)?.insert(key, value);
                }
                Operation::Delete { cf, key } => {
                    table_mut(&mut tables, &cf)?.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> DbResult<()> {
        Ok(())
    }
}
