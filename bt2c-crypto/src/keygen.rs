use bip39::Mnemonic;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};

use bt2c_core::Address;

use crate::error::CryptoError;

/// RSA modulus size for BT2C validator and wallet keys.
pub const RSA_KEY_BITS: usize = 2048;

/// A generated or recovered keypair, plus its derived address.
pub struct Keypair {
    pub private_key: RsaPrivateKey,
    pub public_key: RsaPublicKey,
}

impl Keypair {
    pub fn private_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        self.private_key
            .to_pkcs8_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn public_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        self.public_key
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn address(&self) -> Result<Address, CryptoError> {
        Ok(Address::from_public_key_der(&self.public_key_der()?))
    }
}

/// Generates a fresh 24-word BIP-39 seed phrase.
pub fn generate_mnemonic() -> Result<Mnemonic, CryptoError> {
    Mnemonic::generate(24).map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))
}

/// Deterministically derives an RSA keypair from a BIP-39 seed phrase.
///
/// The seed phrase is stretched into a 64-byte seed via BIP-39's standard
/// PBKDF2-HMAC-SHA512 (2048 rounds), then re-hashed with SHA-512 and used
/// to seed a ChaCha20 CSPRNG that drives RSA key generation. The same
/// phrase and passphrase always yield the same keypair, which is what lets
/// a wallet be recovered from its seed phrase alone.
pub fn keypair_from_mnemonic(phrase: &str, passphrase: &str) -> Result<Keypair, CryptoError> {
    let mnemonic = Mnemonic::parse_normalized(phrase)
        .map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))?;
    let seed = mnemonic.to_seed(passphrase);
    let reseed = Sha512::digest(seed);

    let mut rng_seed = [0u8; 32];
    rng_seed.copy_from_slice(&reseed[..32]);
    let mut rng = ChaCha20Rng::from_seed(rng_seed);

    let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok(Keypair {
        private_key,
        public_key,
    })
}

pub fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn same_phrase_yields_same_address() {
        let a = keypair_from_mnemonic(PHRASE, "").unwrap();
        let b = keypair_from_mnemonic(PHRASE, "").unwrap();
        assert_eq!(a.address().unwrap(), b.address().unwrap());
    }

    #[test]
    fn different_passphrase_yields_different_address() {
        let a = keypair_from_mnemonic(PHRASE, "").unwrap();
        let b = keypair_from_mnemonic(PHRASE, "extra").unwrap();
        assert_ne!(a.address().unwrap(), b.address().unwrap());
    }

    #[test]
    fn rejects_invalid_phrase() {
        assert!(keypair_from_mnemonic("not a real seed phrase at all", "").is_err());
    }
}
