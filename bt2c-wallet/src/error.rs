use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Crypto(#[from] bt2c_crypto::CryptoError),

    #[error(transparent)]
    Core(#[from] bt2c_core::CoreError),
}
