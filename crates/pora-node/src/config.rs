//! Node configuration.

use std::path::PathBuf;

use pora_flow::FlowConfig;
use pora_mine::validator::MineConfig;
use pora_types::Address;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Flow ledger settings.
    #[serde(default)]
    pub flow: FlowConfig,
    /// Validator settings.
    #[serde(default)]
    pub mine: MineConfig,
    /// Local miner identity and range.
    #[serde(default)]
    pub miner: MinerConfig,
    /// Local simulation settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Local miner configuration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Seed for the registered miner id.
    #[serde(default = "default_miner_seed")]
    pub seed: u64,
    /// Reward address, hex.
    #[serde_as(as = "serde_with::hex::Hex")]
    #[serde(default = "default_beneficiary")]
    pub beneficiary: Address,
    #[serde(default)]
    pub shard_id: u64,
    /// The flow is split into `2^shard_bits` shards; 0 is unsharded.
    #[serde(default)]
    pub shard_bits: u32,
    /// Nonces tried per epoch before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u64,
}

/// Local simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Epochs to run.
    #[serde(default = "default_epochs")]
    pub epochs: u64,
    /// Sectors appended to the flow each epoch.
    #[serde(default = "default_segment_sectors")]
    pub segment_sectors: u64,
    /// Seed for data and nonces.
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_miner_seed() -> u64 {
    1
}

fn default_beneficiary() -> Address {
    [0x01; 20]
}

fn default_max_attempts() -> u64 {
    1024
}

fn default_epochs() -> u64 {
    5
}

fn default_segment_sectors() -> u64 {
    4096
}

fn default_rng_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            seed: default_miner_seed(),
            beneficiary: default_beneficiary(),
            shard_id: 0,
            shard_bits: 0,
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            segment_sectors: default_segment_sectors(),
            rng_seed: default_rng_seed(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl MinerConfig {
    pub fn shard_mask(&self) -> u64 {
        u64::MAX.checked_shl(self.shard_bits).unwrap_or(0)
    }
}

impl NodeConfig {
    /// Load configuration from `$PORA_CONFIG` or the first CLI argument.
    ///
    /// Falls back to defaults if neither names an existing file.
    pub fn load() -> anyhow::Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        config.mine.validate()?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        // Check env var override first
        if let Ok(path) = std::env::var("PORA_CONFIG") {
            return Some(PathBuf::from(path));
        }
        std::env::args().nth(1).map(PathBuf::from)
    }
}
