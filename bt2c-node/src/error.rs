use thiserror::Error;

use bt2c_chain::ChainError;
use bt2c_config::ConfigError;
use bt2c_consensus::ConsensusError;
use bt2c_core::CoreError;
use bt2c_mempool::RejectReason;
use bt2c_wallet::WalletError;

/// Errors surfaced across the scheduler boundary. Each sub-crate keeps its
/// own typed error taxonomy (`ChainError`, `ConsensusError`,
/// `RejectReason`, ...); this enum is the single seam a node operator or
/// the (absent, by design) RPC surface would see.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error("transaction rejected: {0}")]
    Mempool(#[from] RejectReason),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("no block producer key available for validator {0}")]
    NoSigningKey(String),

    #[error("block production skipped: {0}")]
    NothingToPropose(String),
}
