//! Deterministic key derivation and RSA signing for BT2C wallets and
//! validators: a BIP-39 seed phrase maps to the same keypair every time,
//! which is what lets a wallet be recovered from the phrase alone.

pub mod error;
pub mod keygen;
pub mod provider;

pub use error::CryptoError;
pub use keygen::{generate_mnemonic, keypair_from_mnemonic, public_key_from_der, Keypair, RSA_KEY_BITS};
pub use provider::DefaultCryptoProvider;
