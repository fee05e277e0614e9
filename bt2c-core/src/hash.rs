use sha2::{Digest, Sha256};

/// A SHA-256 digest, used for transaction hashes, block hashes and the Merkle root.
pub type Hash = [u8; 32];

/// 64 zero-hex bytes: the `previous_hash` of the genesis block and the `merkle_root`
/// of an empty transaction list.
pub const ZERO_HASH: Hash = [0u8; 32];

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

pub fn from_hex(s: &str) -> Result<Hash, hex::FromHexError> {
    let bytes = hex::decode(s)?;
    bytes
        .try_into()
        .map_err(|_| hex::FromHexError::InvalidStringLength)
}

/// Number of leading zero hex nibbles, used as a difficulty proxy when
/// comparing candidate chains during fork resolution.
pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let hex = to_hex(hash);
    hex.chars().take_while(|c| *c == '0').count() as u32
}
