use bt2c_config::ChainConfig;
use bt2c_core::{merkle_root, Address, Amount, Block, BlockHeader, Transaction, TransactionPayload, ZERO_HASH};

/// Fixed timestamp baked into every network's genesis block so two nodes
/// started from the same [`ChainConfig`] derive byte-identical genesis
/// hashes without coordinating a clock.
const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const GENESIS_NONCE: u64 = 0;
const GENESIS_MESSAGE: &str = "BT2C genesis block";

/// Builds the height-0 block every node bootstraps from. Its single
/// transaction is the reserved-sender coinbase carrying the genesis
/// message; no balance is seeded here beyond what [`ChainConfig`]'s
/// distribution rewards grant later registrants during the bootstrap
/// window, applied as validators join rather than pre-minted at genesis.
pub fn build(_config: &ChainConfig) -> Block {
    let coinbase = Transaction {
        sender: Address::genesis(),
        recipient: Address::genesis(),
        amount: Amount::ZERO,
        fee: Amount::ZERO,
        nonce: 0,
        timestamp: GENESIS_TIMESTAMP,
        payload: TransactionPayload::Reward { block_height: 0 },
        signature: Vec::new(),
    };
    let transactions = vec![coinbase];
    let header = BlockHeader {
        height: 0,
        previous_hash: ZERO_HASH,
        timestamp: GENESIS_TIMESTAMP,
        validator: Address::reserved(),
        nonce: GENESIS_NONCE,
        merkle_root: merkle_root(&transactions),
    };
    Block {
        header,
        transactions,
        signature: Vec::new(),
    }
}

/// The genesis message embedded in the coinbase transaction's payload,
/// exposed for display/diagnostics rather than consensus.
pub fn message() -> &'static str {
    GENESIS_MESSAGE
}

/// The fixed genesis timestamp, used as the distribution window's epoch
/// when constructing a fresh [`crate::node::Node`].
pub fn timestamp() -> u64 {
    GENESIS_TIMESTAMP
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt2c_config::NetworkType;

    #[test]
    fn genesis_is_deterministic_across_builds() {
        let config = ChainConfig::for_network(NetworkType::Devnet);
        let a = build(&config);
        let b = build(&config);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn genesis_has_valid_merkle_root_and_zero_parent() {
        let config = ChainConfig::for_network(NetworkType::Devnet);
        let genesis = build(&config);
        assert!(genesis.has_valid_merkle_root());
        assert_eq!(genesis.header.previous_hash, ZERO_HASH);
        assert_eq!(genesis.header.height, 0);
    }
}
