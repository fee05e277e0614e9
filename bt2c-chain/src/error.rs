use thiserror::Error;

use bt2c_core::Address;
use bt2c_mempool::RejectReason;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block height {got} does not follow the current tip's height {expected}")]
    WrongHeight { expected: u64, got: u64 },

    #[error("block's previous_hash does not match the current tip")]
    WrongParent,

    #[error("block merkle root does not match its transactions")]
    BadMerkleRoot,

    #[error("block timestamp does not exceed the parent's timestamp")]
    NonMonotonicTimestamp,

    #[error("validator {0} is not eligible to propose")]
    IneligibleValidator(Address),

    #[error("block signature does not verify")]
    BadBlockSignature,

    #[error("transaction {0} rejected: {1}")]
    TransactionRejected(String, RejectReason),

    #[error("transaction signature does not verify")]
    BadTransactionSignature,

    #[error("the first transaction in a block must be the reward/coinbase transaction")]
    MissingCoinbase,

    #[error("coinbase pays {got}, expected the protocol subsidy of {expected}")]
    WrongCoinbaseAmount { expected: String, got: String },

    #[error("cannot roll back to height {0}: no retained block at that height")]
    RollbackTargetMissing(u64),

    #[error(transparent)]
    Core(#[from] bt2c_core::CoreError),
}
