use crate::config::types::{ExchangeConfig, NodeConfig};
use crate::config::validation::{validate_exchange, validate_node};
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and validates a node configuration file.
pub fn load_node_config(path: &Path) -> Result<NodeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: NodeConfig = toml::from_str(&content)?;
    validate_node(&config)?;
    Ok(config)
}

/// Loads and validates an exchange configuration file.
pub fn load_exchange_config(path: &Path) -> Result<ExchangeConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: ExchangeConfig = toml::from_str(&content)?;
    validate_exchange(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content.
///
/// Used to detect whether the configuration changed between runs.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a node configuration and returns it together with its hash.
pub fn load_node_config_with_hash(path: &Path) -> Result<(NodeConfig, String), ConfigError> {
    let config = load_node_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
