use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::sha256;

pub const ADDRESS_PREFIX: &str = "bt2c_";
/// Total length of an encoded address: `bt2c_` (5) + 26 base32 chars.
pub const ADDRESS_LEN: usize = 31;
const BASE32_ALPHABET: base32::Alphabet = base32::Alphabet::Rfc4648Lower { padding: false };

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address missing '{ADDRESS_PREFIX}' prefix")]
    MissingPrefix,
    #[error("address has length {0}, expected {ADDRESS_LEN}")]
    BadLength(usize),
    #[error("address body is not valid lowercase base32")]
    BadAlphabet,
}

/// A BT2C account/validator address: `bt2c_` followed by 26 lowercase base32
/// characters, the first 16 bytes of SHA-256(public-key-DER) reencoded.
///
/// The reserved sender/recipient `"0"` (and the genesis coinbase's
/// `"0"` * 64) bypass the normal format and are constructed with
/// [`Address::reserved`] / [`Address::genesis`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        if s == "0" {
            return Ok(Self(s.to_string()));
        }
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or(AddressError::MissingPrefix)?;
        if s.len() != ADDRESS_LEN {
            return Err(AddressError::BadLength(s.len()));
        }
        if !body
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'2'..=b'7'))
        {
            return Err(AddressError::BadAlphabet);
        }
        Ok(Self(s.to_string()))
    }

    /// Derive the address owning a DER-encoded public key.
    pub fn from_public_key_der(der: &[u8]) -> Self {
        let digest = sha256(der);
        let encoded = base32::encode(BASE32_ALPHABET, &digest[..16]).to_lowercase();
        Self(format!("{ADDRESS_PREFIX}{encoded}"))
    }

    /// The reserved sender used by reward and genesis transactions.
    pub fn reserved() -> Self {
        Self("0".to_string())
    }

    /// The genesis block's coinbase sender/recipient, `"0"` repeated 64 times.
    pub fn genesis() -> Self {
        Self("0".repeat(64))
    }

    pub fn is_reserved(&self) -> bool {
        self.0 == "0" || self.0.chars().all(|c| c == '0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_fixed_length_address() {
        let addr = Address::from_public_key_der(b"some-der-encoded-public-key");
        assert_eq!(addr.as_str().len(), ADDRESS_LEN);
        assert!(addr.as_str().starts_with(ADDRESS_PREFIX));
        Address::parse(addr.as_str()).unwrap();
    }

    #[test]
    fn rejects_bad_prefix() {
        assert_eq!(
            Address::parse("xx2c_abcdefghijklmnopqrstuvwxyz"),
            Err(AddressError::MissingPrefix)
        );
    }

    #[test]
    fn rejects_bad_length() {
        assert!(matches!(
            Address::parse("bt2c_tooshort"),
            Err(AddressError::BadLength(_))
        ));
    }

    #[test]
    fn reserved_and_genesis_bypass_validation() {
        assert!(Address::reserved().is_reserved());
        assert!(Address::genesis().is_reserved());
    }

    #[test]
    fn deterministic_derivation() {
        let a = Address::from_public_key_der(b"key-material");
        let b = Address::from_public_key_der(b"key-material");
        assert_eq!(a, b);
    }
}
