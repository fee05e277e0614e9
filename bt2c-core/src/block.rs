use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::canonical::canonical_bytes;
use crate::hash::{sha256, Hash, ZERO_HASH};
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub previous_hash: Hash,
    pub timestamp: u64,
    pub validator: Address,
    /// Proposer-chosen value with no consensus meaning of its own; mixed
    /// into the header hash so two otherwise-identical blocks can be
    /// distinguished, and folded into the next selection seed.
    pub nonce: u64,
    pub merkle_root: Hash,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        sha256(&canonical_bytes(self).expect("block header is always representable as JSON"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// The proposing validator's signature over `header.hash()`.
    pub signature: Vec<u8>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Recomputes the Merkle root over `self.transactions` and compares it
    /// against `self.header.merkle_root`.
    pub fn has_valid_merkle_root(&self) -> bool {
        merkle_root(&self.transactions) == self.header.merkle_root
    }

    pub fn size_bytes(&self) -> usize {
        self.transactions.iter().map(Transaction::size_bytes).sum()
    }
}

/// Pairwise SHA-256 Merkle root over transaction hashes, duplicating the
/// final hash when a level has an odd count. Returns [`ZERO_HASH`] for an
/// empty transaction list.
pub fn merkle_root(transactions: &[Transaction]) -> Hash {
    if transactions.is_empty() {
        return ZERO_HASH;
    }
    let mut level: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0]);
                buf.extend_from_slice(&pair[1]);
                sha256(&buf)
            })
            .collect();
    }
    level[0]
}
