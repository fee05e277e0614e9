use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RejectReason {
    #[error("signature does not verify")]
    InvalidSignature,

    #[error("nonce {got} is not contiguous with the last accepted nonce {last_seen} (expected {})", last_seen + 1)]
    InvalidNonce { last_seen: u64, got: u64 },

    #[error("sender balance insufficient for amount + fee")]
    InsufficientBalance,

    #[error("transaction already in mempool")]
    DuplicateTransaction,

    #[error("mempool is full and this transaction does not outbid the lowest-fee entry")]
    MempoolFull,

    #[error("transaction timestamp is outside the accepted window")]
    InvalidTimestamp,

    #[error("transaction exceeds the maximum encoded size")]
    Oversized,
}
