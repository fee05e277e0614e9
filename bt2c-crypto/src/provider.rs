use async_trait::async_trait;
use rsa::pkcs1v15::Pkcs1v15Sign;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};

use bt2c_core::{Address, CoreError, CryptoProvider};

use crate::error::CryptoError;
use crate::keygen::public_key_from_der;

/// RSASSA-PKCS1-v1_5/SHA-256 signing and verification, and address
/// derivation from DER-encoded public keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCryptoProvider;

impl DefaultCryptoProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CryptoProvider for DefaultCryptoProvider {
    fn address_from_public_key(&self, public_key_der: &[u8]) -> Address {
        Address::from_public_key_der(public_key_der)
    }

    async fn sign(&self, private_key_der: &[u8], message: &[u8]) -> Result<Vec<u8>, CoreError> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_key_der)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let digest = Sha256::digest(message);
        private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()).into())
    }

    async fn verify(
        &self,
        public_key_der: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, CoreError> {
        let public_key = public_key_from_der(public_key_der).map_err(CoreError::from)?;
        let digest = Sha256::digest(message);
        Ok(public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::keypair_from_mnemonic;

    #[tokio::test]
    async fn signs_and_verifies() {
        let keypair = keypair_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
        )
        .unwrap();
        let provider = DefaultCryptoProvider::new();
        let priv_der = keypair.private_key_der().unwrap();
        let pub_der = keypair.public_key_der().unwrap();

        let message = b"bt2c transaction body";
        let signature = provider.sign(&priv_der, message).await.unwrap();
        assert!(provider.verify(&pub_der, message, &signature).await.unwrap());
        assert!(!provider
            .verify(&pub_der, b"tampered", &signature)
            .await
            .unwrap());
    }

    #[test]
    fn derives_same_address_as_keypair() {
        let keypair = keypair_from_mnemonic(
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
            "",
        )
        .unwrap();
        let provider = DefaultCryptoProvider::new();
        let pub_der = keypair.public_key_der().unwrap();
        assert_eq!(
            provider.address_from_public_key(&pub_der),
            keypair.address().unwrap()
        );
    }
}
