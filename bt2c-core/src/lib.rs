//! Core domain types shared by every BT2C crate: addresses, amounts,
//! transactions, blocks, validators, canonical encoding, and the trait
//! seams (`CryptoProvider`, `Store`, `Transport`) that let consensus and
//! chain logic stay independent of any concrete crypto or storage backend.

pub mod address;
pub mod amount;
pub mod block;
pub mod canonical;
pub mod error;
pub mod hash;
pub mod traits;
pub mod transaction;
pub mod validator;

pub use address::{Address, AddressError};
pub use amount::{Amount, AmountError};
pub use block::{merkle_root, Block, BlockHeader};
pub use canonical::canonical_bytes;
pub use error::CoreError;
pub use hash::{leading_zero_nibbles, sha256, Hash, ZERO_HASH};
pub use traits::{CryptoProvider, Message, Store, Transport};
pub use transaction::{Transaction, TransactionPayload, TransactionType};
pub use validator::{
    ReputationMetrics, UnstakeRequest, UnstakeStatus, Validator, ValidatorStatus, MIN_STAKE,
};

/// Seconds since the Unix epoch, as used throughout transaction and block
/// timestamps.
pub fn now_ts() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
