//! Layered configuration loading (file + environment overrides), and the
//! per-network chain parameters (minimum stake, block time, halving
//! schedule, unbonding period) that drive consensus and reward logic.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bt2c_core::Amount;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Devnet,
}

/// Consensus and reward parameters that vary by network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub network: NetworkType,
    pub min_stake: Amount,
    pub block_time_secs: u64,
    pub halving_interval_blocks: u64,
    pub initial_block_reward: Amount,
    pub max_supply: Amount,
    /// Blocks an unstake request waits in the exit queue before maturing.
    pub unbonding_period_blocks: u64,
    pub distribution_period_days: u64,
    /// First registrant during the distribution window receives this,
    /// added to its stake.
    pub developer_reward: Amount,
    /// Every registrant during the distribution window receives this,
    /// added to its stake.
    pub distribution_reward: Amount,
    pub base_apy_percent: f64,
    pub max_validators: usize,
    pub mempool_capacity: usize,
    pub mempool_tx_ttl_secs: u64,
    pub mempool_max_bytes: usize,
    pub max_block_bytes: usize,
    pub max_tx_per_block: usize,
    /// Sliding window of most recent selections used to measure
    /// per-validator over/under-representation.
    pub fairness_window: usize,
    /// Accumulated slash-points at which a validator is jailed.
    pub slash_jail_threshold: u32,
    pub unjail_wait_days: u64,
    /// Cap on how much the exit-queue congestion multiplier can stretch
    /// the unbonding wait, expressed in days beyond the base period.
    pub max_exit_queue_days: u64,
    /// Confirmations at and above which a transaction is considered FINAL.
    pub finality_confirmations: u64,
}

impl ChainConfig {
    pub fn for_network(network: NetworkType) -> Self {
        match network {
            NetworkType::Mainnet => ChainConfig {
                network,
                min_stake: Amount::from_integer(1),
                block_time_secs: 300,
                halving_interval_blocks: 210_000,
                initial_block_reward: Amount::from_integer(21),
                max_supply: Amount::from_integer(21_000_000),
                unbonding_period_blocks: 20_160,
                distribution_period_days: 14,
                developer_reward: Amount::from_integer(100),
                distribution_reward: Amount::from_integer(1),
                base_apy_percent: 5.0,
                max_validators: 1000,
                mempool_capacity: 50_000,
                mempool_tx_ttl_secs: 3600,
                mempool_max_bytes: 64 * 1024 * 1024,
                max_block_bytes: 2 * 1024 * 1024,
                max_tx_per_block: 5_000,
                fairness_window: 100,
                slash_jail_threshold: 5,
                unjail_wait_days: 7,
                max_exit_queue_days: 49,
                finality_confirmations: 6,
            },
            NetworkType::Testnet => ChainConfig {
                network,
                min_stake: Amount::from_units(100_000_000 / 10),
                block_time_secs: 60,
                halving_interval_blocks: 21_000,
                initial_block_reward: Amount::from_integer(21),
                max_supply: Amount::from_integer(21_000_000),
                unbonding_period_blocks: 1_440,
                distribution_period_days: 7,
                developer_reward: Amount::from_integer(100),
                distribution_reward: Amount::from_integer(1),
                base_apy_percent: 5.0,
                max_validators: 100,
                mempool_capacity: 10_000,
                mempool_tx_ttl_secs: 3600,
                mempool_max_bytes: 16 * 1024 * 1024,
                max_block_bytes: 1024 * 1024,
                max_tx_per_block: 2_000,
                fairness_window: 100,
                slash_jail_threshold: 5,
                unjail_wait_days: 1,
                max_exit_queue_days: 7,
                finality_confirmations: 6,
            },
            NetworkType::Devnet => ChainConfig {
                network,
                min_stake: Amount::from_units(1),
                block_time_secs: 2,
                halving_interval_blocks: 1_000,
                initial_block_reward: Amount::from_integer(21),
                max_supply: Amount::from_integer(21_000_000),
                unbonding_period_blocks: 10,
                distribution_period_days: 0,
                developer_reward: Amount::from_integer(100),
                distribution_reward: Amount::from_integer(1),
                base_apy_percent: 5.0,
                max_validators: 10,
                mempool_capacity: 1_000,
                mempool_tx_ttl_secs: 600,
                mempool_max_bytes: 1024 * 1024,
                max_block_bytes: 256 * 1024,
                max_tx_per_block: 500,
                fairness_window: 20,
                slash_jail_threshold: 5,
                unjail_wait_days: 0,
                max_exit_queue_days: 1,
                finality_confirmations: 2,
            },
        }
    }
}

/// Node-level configuration layered from a file and `BT2C__`-prefixed
/// environment variables, mirroring how the rest of the workspace's
/// services load their settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub listen_addr: String,
    pub data_dir: String,
    pub log_level: String,
    pub chain: ChainConfig,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("BT2C").separator("__"));
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn example(network: NetworkType) -> Self {
        Self {
            listen_addr: "0.0.0.0:7100".into(),
            data_dir: "./data".into(),
            log_level: "info".into(),
            chain: ChainConfig::for_network(network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_and_testnet_diverge() {
        let mainnet = ChainConfig::for_network(NetworkType::Mainnet);
        let testnet = ChainConfig::for_network(NetworkType::Testnet);
        assert_ne!(mainnet.block_time_secs, testnet.block_time_secs);
        assert_ne!(mainnet.unbonding_period_blocks, testnet.unbonding_period_blocks);
    }

    #[test]
    fn example_config_serializes() {
        let cfg = NodeConfig::example(NetworkType::Devnet);
        let toml = toml::to_string(&cfg).unwrap();
        assert!(toml.contains("listen_addr"));
    }
}
