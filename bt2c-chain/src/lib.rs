//! The canonical chain: block validation and application, account
//! balances and nonces, and fork resolution between competing tips.

pub mod error;
pub mod fork;
pub mod manager;

pub use error::ChainError;
pub use fork::{resolve_fork, ChainCandidate};
pub use manager::ChainManager;
