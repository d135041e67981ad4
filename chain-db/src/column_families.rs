//! Column family definitions for the chain database
//!
//! This module defines the column families used to organize data
//! in the key-value store.

/// Column family names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// Blocks (block_hash -> JSON(Block))
    Blocks,
    /// Canonical index (height BE -> block_hash)
    Canonical,
    /// Chain metadata such as the head pointer
    Meta,
    /// Finality marks (block_hash -> 0x01)
    Final,
    /// Finality certificates (block_hash -> JSON(BlockCert))
    Certs,
}

impl ColumnFamily {
    /// Get the string name for this column family
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::Blocks => "blocks",
            ColumnFamily::Canonical => "canonical",
            ColumnFamily::Meta => "meta",
            ColumnFamily::Final => "final",
            ColumnFamily::Certs => "certs",
        }
    }

    /// Get all column families
    pub fn all() -> &'static [ColumnFamily] {
        &[
            ColumnFamily::Blocks,
            ColumnFamily::Canonical,
            ColumnFamily::Meta,
            ColumnFamily::Final,
            ColumnFamily::Certs,
        ]
    }

    /// Get column family from name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "blocks" => Some(ColumnFamily::Blocks),
            "canonical" => Some(ColumnFamily::Canonical),
            "meta" => Some(ColumnFamily::Meta),
            "final" => Some(ColumnFamily::Final),
            "certs" => Some(ColumnFamily::Certs),
            _ => None,
        }
    }
}

impl std::fmt::Display for ColumnFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_family_names() {
        assert_eq!(ColumnFamily::Blocks.name(), "blocks");
        assert_eq!(ColumnFamily::Canonical.name(), "canonical");
        assert_eq!(ColumnFamily::Meta.name(), "meta");
        assert_eq!(ColumnFamily::Final.name(), "final");
        assert_eq!(ColumnFamily::Certs.name(), "certs");
    }

    #[test]
    fn test_column_family_from_name() {
        for cf in ColumnFamily::all() {
            assert_eq!(ColumnFamily::from_name(cf.name()), Some(*cf));
        }
        assert_eq!(ColumnFamily::from_name("receipts"), None);
    }
}
