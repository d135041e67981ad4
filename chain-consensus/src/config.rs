//! Sortition parameters

use crate::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Consensus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Minimum VRF fraction a node needs to propose a block
    pub proposer_threshold: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            proposer_threshold: 0.5,
        }
    }
}

impl ConsensusConfig {
    pub fn new(proposer_threshold: f64) -> Self {
        Self { proposer_threshold }
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConsensusResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConsensusError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConsensusConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConsensusResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)
            .map_err(|e| ConsensusError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConsensusResult<()> {
        if !(0.0..=1.0).contains(&self.proposer_threshold) {
            return Err(ConsensusError::Config(format!(
                "Proposer threshold must be within [0, 1], got {}",
                self.proposer_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ConsensusConfig::default();
        assert_eq!(config.proposer_threshold, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(ConsensusConfig::new(0.0).validate().is_ok());
        assert!(ConsensusConfig::new(1.0).validate().is_ok());
        assert!(ConsensusConfig::new(-0.1).validate().is_err());
        assert!(ConsensusConfig::new(1.5).validate().is_err());
        assert!(ConsensusConfig::new(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_file_operations() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("consensus.json");

        let config = ConsensusConfig::new(0.25);
        config.save_to_file(&file_path).unwrap();

        let loaded = ConsensusConfig::load_from_file(&file_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("consensus.json");
        fs::write(&file_path, r#"{"proposer_threshold": 2.0}"#).unwrap();

        assert!(matches!(
            ConsensusConfig::load_from_file(&file_path),
            Err(ConsensusError::Config(_))
        ));
        assert!(ConsensusConfig::load_from_file(dir.path().join("missing.json")).is_err());
    }
}
