//! The pending-transaction pool: an arena of unconfirmed transactions
//! indexed by hash, sender nonce, and sender address, with a fee-priority
//! heap for selecting the next block's contents.

pub mod error;
pub mod pool;

pub use error::RejectReason;
pub use pool::{Mempool, MAX_TX_SIZE_BYTES};
