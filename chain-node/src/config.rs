//! Node configuration

use crate::{ChainError, ChainResult};
use chain_consensus::ConsensusConfig;
use chain_core::{Address, Amount, Network};
use chain_vm::FeeSchedule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Reward credited to the proposer of every non-empty block
pub const DEFAULT_BLOCK_REWARD: u64 = 5;

/// Initial balance of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAlloc {
    /// Hex address, with or without `0x`
    pub address: String,
    pub balance: Amount,
}

/// Genesis state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub alloc: Vec<GenesisAlloc>,
}

impl GenesisConfig {
    /// Parsed allocations in file order
    pub fn accounts(&self) -> ChainResult<Vec<(Address, Amount)>> {
        self.alloc
            .iter()
            .map(|entry| {
                let address = Address::from_hex(&entry.address).map_err(|e| {
                    ChainError::Config(format!(
                        "Invalid genesis address {}: {}",
                        entry.address, e
                    ))
                })?;
                Ok((address, entry.balance.clone()))
            })
            .collect()
    }
}

/// Node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: Network,
    pub block_reward: Amount,
    pub consensus: ConsensusConfig,
    pub fees: FeeSchedule,
    pub genesis: GenesisConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            block_reward: Amount::from_u64(DEFAULT_BLOCK_REWARD),
            consensus: ConsensusConfig::default(),
            fees: FeeSchedule::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ChainResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ChainError::Config(format!("Failed to read config file: {}", e)))?;
        let config: NodeConfig = toml::from_str(&content)
            .map_err(|e| ChainError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ChainResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ChainError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path.as_ref(), content)
            .map_err(|e| ChainError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ChainResult<()> {
        self.consensus
            .validate()
            .map_err(|e| ChainError::Config(e.to_string()))?;
        self.fees
            .validate()
            .map_err(|e| ChainError::Config(e.to_string()))?;
        self.genesis.accounts()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.block_reward, Amount::from_u64(5));
        assert!(config.genesis.alloc.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: NodeConfig = toml::from_str(
            r#"
            network = "mainnet"

            [consensus]
            proposer_threshold = 0.25

            [[genesis.alloc]]
            address = "0x1111111111111111111111111111111111111111"
            balance = "1000000000000000000000000"
            "#,
        )
        .unwrap();

        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.consensus.proposer_threshold, 0.25);
        assert_eq!(config.fees, FeeSchedule::default());
        let accounts = config.genesis.accounts().unwrap();
        assert_eq!(accounts[0].0, Address::new([0x11; 20]));
        assert_eq!(
            accounts[0].1,
            "1000000000000000000000000".parse::<Amount>().unwrap()
        );
    }

    #[test]
    fn test_file_operations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node.toml");

        let mut config = NodeConfig::default();
        config.genesis.alloc.push(GenesisAlloc {
            address: "2222222222222222222222222222222222222222".to_string(),
            balance: Amount::from_u64(77),
        });
        config.save_to_file(&path).unwrap();

        assert_eq!(NodeConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = NodeConfig::default();
        config.consensus.proposer_threshold = 3.0;
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));

        let mut config = NodeConfig::default();
        config.genesis.alloc.push(GenesisAlloc {
            address: "0xnothex".to_string(),
            balance: Amount::from_u64(1),
        });
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));

        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "network = 7").unwrap();
        assert!(NodeConfig::load_from_file(&path).is_err());
    }
}
