//! Configuration module
//!
//! TOML configuration for both process types, with defaults for every field
//! so a missing or empty file yields a working setup.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CrawlConfig, ExchangeConfig, FetchConfig, NodeConfig, StoreConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_exchange_config, load_node_config, load_node_config_with_hash,
};
