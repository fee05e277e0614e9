use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid BIP-39 seed phrase: {0}")]
    InvalidMnemonic(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key encoding: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    InvalidSignature,
}

impl From<CryptoError> for bt2c_core::CoreError {
    fn from(err: CryptoError) -> Self {
        bt2c_core::CoreError::Crypto(err.to_string())
    }
}
