use std::cmp::Ordering;

use bt2c_core::{leading_zero_nibbles, Amount, Block, Hash};

/// A competing chain tip, with the data `resolve_fork` needs to score it.
/// `blocks` must be ordered from genesis (or the last common ancestor) to
/// the tip.
#[derive(Debug, Clone)]
pub struct ChainCandidate {
    pub tip_hash: Hash,
    pub length: u64,
    /// Total stake backing the validator set that produced this chain, as
    /// of its tip — supplied by the caller since stake history isn't this
    /// crate's concern.
    pub total_stake: Amount,
    pub blocks: Vec<Block>,
}

impl ChainCandidate {
    /// A difficulty proxy summed across the candidate's blocks: each
    /// block's contribution is its encoded size times its transaction
    /// count (plus one, so empty blocks still count) times the number of
    /// leading zero hex nibbles in its Merkle root.
    pub fn accumulated_difficulty(&self) -> f64 {
        self.blocks
            .iter()
            .map(|b| {
                let size = b.size_bytes() as f64;
                let tx_factor = (1 + b.transactions.len()) as f64;
                let zeros = leading_zero_nibbles(&b.header.merkle_root) as f64;
                size * tx_factor * zeros
            })
            .sum()
    }

    /// Average seconds between consecutive blocks. Lower is preferred —
    /// a faster chain is assumed to reflect more active validator
    /// participation.
    pub fn average_block_time(&self) -> f64 {
        if self.blocks.len() < 2 {
            return f64::MAX;
        }
        let mut deltas = Vec::with_capacity(self.blocks.len() - 1);
        for pair in self.blocks.windows(2) {
            let delta = pair[1].header.timestamp.saturating_sub(pair[0].header.timestamp);
            deltas.push(delta as f64);
        }
        deltas.iter().sum::<f64>() / deltas.len() as f64
    }
}

/// Orders two candidates by BT2C's fork-choice rule: longer chain wins;
/// ties broken by greater backing stake; then by greater accumulated
/// difficulty; then by lower average block time; then, if still tied, by
/// the lexicographically smaller tip hash (so every honest node converges
/// on the same winner even with otherwise-identical chains).
fn compare(a: &ChainCandidate, b: &ChainCandidate) -> Ordering {
    a.length
        .cmp(&b.length)
        .then_with(|| a.total_stake.units().cmp(&b.total_stake.units()))
        .then_with(|| {
            a.accumulated_difficulty()
                .partial_cmp(&b.accumulated_difficulty())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            b.average_block_time()
                .partial_cmp(&a.average_block_time())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.tip_hash.cmp(&a.tip_hash))
}

/// Picks the winning chain among `candidates` per BT2C's fork-choice rule.
/// Panics if `candidates` is empty — callers always have at least the
/// current chain to compare against.
pub fn resolve_fork(candidates: &[ChainCandidate]) -> &ChainCandidate {
    candidates
        .iter()
        .max_by(|a, b| compare(a, b))
        .expect("resolve_fork requires at least one candidate")
}
