//! A BT2C wallet: a deterministic keypair recoverable from a BIP-39 seed
//! phrase, its derived address, and transaction signing. Persisting the
//! seed phrase or private key at rest is the caller's responsibility —
//! this crate only ever holds key material in memory.

pub mod error;

use bip39::Mnemonic;
use bt2c_core::{Address, CryptoProvider, Transaction};
use bt2c_crypto::{keypair_from_mnemonic, Keypair};

pub use error::WalletError;

pub struct Wallet {
    address: Address,
    keypair: Keypair,
}

impl Wallet {
    /// Recovers a wallet deterministically from a BIP-39 seed phrase. The
    /// same phrase and passphrase always yield the same wallet.
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, WalletError> {
        let keypair = keypair_from_mnemonic(phrase, passphrase)?;
        let address = keypair.address()?;
        Ok(Self { address, keypair })
    }

    /// Generates a fresh wallet along with the seed phrase that recovers it.
    /// The caller is responsible for persisting the phrase; this crate
    /// never writes key material to disk.
    pub fn generate() -> Result<(Self, Mnemonic), WalletError> {
        let mnemonic = bt2c_crypto::generate_mnemonic()?;
        let wallet = Self::from_mnemonic(&mnemonic.to_string(), "")?;
        Ok((wallet, mnemonic))
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key_der(&self) -> Result<Vec<u8>, WalletError> {
        Ok(self.keypair.public_key_der()?)
    }

    /// Signs `transaction` in place using the supplied crypto provider,
    /// over the transaction's signature-excluded canonical encoding.
    pub async fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        provider: &dyn CryptoProvider,
    ) -> Result<(), WalletError> {
        let private_key_der = self.keypair.private_key_der()?;
        let bytes = transaction.signing_bytes();
        let signature = provider.sign(&private_key_der, &bytes).await?;
        transaction.signature = signature;
        Ok(())
    }

    /// Verifies that recovering a wallet from `phrase`/`passphrase` yields
    /// `expected_address`, without needing access to the original keypair.
    pub fn verify_recovery(
        phrase: &str,
        passphrase: &str,
        expected_address: &Address,
    ) -> Result<bool, WalletError> {
        let recovered = Wallet::from_mnemonic(phrase, passphrase)?;
        Ok(recovered.address() == expected_address)
    }
}
