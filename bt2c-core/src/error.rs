use thiserror::Error;

use crate::address::AddressError;
use crate::amount::AmountError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("canonical encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("transport operation failed: {0}")]
    Transport(String),
}
