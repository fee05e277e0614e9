use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use bt2c_core::{Address, Amount, Hash, Validator, ValidatorStatus, MIN_STAKE};

/// Fraction of a validator's recent blocks containing at least one
/// invalid transaction, above which the validator is treated as Byzantine.
pub const BYZANTINE_INVALID_TX_RATIO_THRESHOLD: f64 = 0.30;

/// Number of a validator's most recent blocks considered by the Byzantine
/// ratio check.
pub const BYZANTINE_WINDOW_SIZE: usize = 20;

/// Accumulated slash-points at which a validator is jailed, absent any
/// single severe event. Mirrors `ChainConfig::slash_jail_threshold`; kept
/// here as the fallback default for callers that construct a bare
/// [`Slasher`] without a config (e.g. unit tests).
pub const DEFAULT_SLASH_JAIL_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlashReason {
    /// Two distinct blocks signed at the same height. Always the full
    /// stake, always terminal.
    DoubleSign,
    /// A graduated offense: bad `previous_hash`, bad block hash, or a bad
    /// transaction signature inside an otherwise-proposed block. Costs one
    /// slash-point and no direct stake cut; jailing only follows once the
    /// accumulated point total crosses the threshold.
    InvalidBlock,
    /// Sliding-window detection: too large a fraction of a validator's
    /// recent blocks contained invalid transactions.
    ByzantineRatio,
}

/// Outcome of applying a single [`Evidence`] to a validator: what changed
/// in its stake and status.
#[derive(Debug, Clone, PartialEq)]
pub struct Penalty {
    pub reason: SlashReason,
    /// Stake burned by this penalty (zero for a graduated `InvalidBlock`
    /// point that hasn't yet crossed the jailing threshold).
    pub slashed: Amount,
    pub new_status: ValidatorStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub validator: Address,
    pub reason: SlashReason,
    pub height: u64,
    pub detail: String,
}

/// Per-validator sliding window of recent blocks, each flagged for whether
/// it contained an invalid transaction — backs the Byzantine ratio check.
#[derive(Default)]
struct Window {
    flags: VecDeque<bool>,
}

impl Window {
    fn record(&mut self, had_invalid_tx: bool) {
        if self.flags.len() == BYZANTINE_WINDOW_SIZE {
            self.flags.pop_front();
        }
        self.flags.push_back(had_invalid_tx);
    }

    fn invalid_ratio(&self) -> f64 {
        if self.flags.is_empty() {
            return 0.0;
        }
        self.flags.iter().filter(|f| **f).count() as f64 / self.flags.len() as f64
    }
}

/// Detects slashable behavior and computes the corresponding penalty.
/// Tracks one block hash per `(validator, height)` to catch double-signing,
/// and a rolling per-validator window of invalid-transaction flags to catch
/// Byzantine block production. Evidence is a pure description of what was
/// observed; [`Slasher::apply`] is the only place a penalty is computed
/// from it, so callers can persist evidence before applying the penalty
/// (per the crash-safety requirement: a crash between the two replays
/// safely because evidence alone is idempotent to record).
#[derive(Default)]
pub struct Slasher {
    signed_at_height: RwLock<HashMap<(Address, u64), Hash>>,
    windows: RwLock<HashMap<Address, Window>>,
}

impl Slasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `validator` signed `block_hash` at `height`. Returns
    /// evidence if the validator previously signed a *different* hash at
    /// the same height — a double-sign provable across forks since both
    /// hashes are retained regardless of which branch was eventually
    /// adopted.
    pub fn observe_signature(
        &self,
        validator: &Address,
        height: u64,
        block_hash: Hash,
    ) -> Option<Evidence> {
        let mut seen = self.signed_at_height.write();
        let key = (validator.clone(), height);
        match seen.get(&key) {
            Some(previous) if *previous != block_hash => Some(Evidence {
                validator: validator.clone(),
                reason: SlashReason::DoubleSign,
                height,
                detail: format!(
                    "signed {} and {} at height {height}",
                    bt2c_core::hash::to_hex(previous),
                    bt2c_core::hash::to_hex(&block_hash)
                ),
            }),
            Some(_) => None,
            None => {
                seen.insert(key, block_hash);
                None
            }
        }
    }

    pub fn invalid_block_evidence(&self, validator: &Address, height: u64, reason: &str) -> Evidence {
        Evidence {
            validator: validator.clone(),
            reason: SlashReason::InvalidBlock,
            height,
            detail: reason.to_string(),
        }
    }

    /// Feeds one more observed block from `validator` into its Byzantine
    /// detection window and returns evidence if the invalid-transaction
    /// ratio over the trailing window now exceeds the threshold.
    pub fn observe_block(
        &self,
        validator: &Address,
        height: u64,
        had_invalid_tx: bool,
    ) -> Option<Evidence> {
        let mut windows = self.windows.write();
        let window = windows.entry(validator.clone()).or_default();
        window.record(had_invalid_tx);
        let ratio = window.invalid_ratio();
        if ratio > BYZANTINE_INVALID_TX_RATIO_THRESHOLD {
            Some(Evidence {
                validator: validator.clone(),
                reason: SlashReason::ByzantineRatio,
                height,
                detail: format!("invalid-transaction ratio {ratio:.3} over trailing window"),
            })
        } else {
            None
        }
    }

    /// Computes the penalty for a single piece of evidence against a
    /// validator's current stake, without mutating anything — the caller
    /// (`ValidatorSet`) owns applying the result and persisting it.
    ///
    /// `jail_threshold` is the accumulated slash-point count (inclusive of
    /// the point this `InvalidBlock` evidence contributes) at which a
    /// validator moves to `Jailed`; below it, an `InvalidBlock` penalty is
    /// point-only with no stake cut.
    pub fn evaluate(
        evidence: &Evidence,
        current_stake: Amount,
        slash_points_after: u32,
        jail_threshold: u32,
    ) -> Penalty {
        match evidence.reason {
            SlashReason::DoubleSign => Penalty {
                reason: SlashReason::DoubleSign,
                slashed: current_stake,
                new_status: ValidatorStatus::Tombstoned,
            },
            SlashReason::InvalidBlock => {
                let new_status = if slash_points_after >= jail_threshold {
                    ValidatorStatus::Jailed
                } else {
                    ValidatorStatus::Active
                };
                Penalty {
                    reason: SlashReason::InvalidBlock,
                    slashed: Amount::ZERO,
                    new_status,
                }
            }
            SlashReason::ByzantineRatio => {
                let slashed = current_stake.checked_mul_f64(0.50);
                let residual = current_stake.saturating_sub(slashed);
                let new_status = if residual.units() < Amount::from_integer(MIN_STAKE).units() {
                    ValidatorStatus::Tombstoned
                } else {
                    ValidatorStatus::Jailed
                };
                Penalty {
                    reason: SlashReason::ByzantineRatio,
                    slashed,
                    new_status,
                }
            }
        }
    }

    /// Whether `validator` may be unjailed: the wait period (measured from
    /// `jailed_at`, per the recovery formula) has elapsed and its residual
    /// stake still clears the minimum.
    pub fn can_unjail(validator: &Validator, now: u64, wait_period_secs: u64) -> bool {
        validator.status == ValidatorStatus::Jailed
            && validator
                .jailed_at
                .is_some_and(|jailed_at| now.saturating_sub(jailed_at) >= wait_period_secs)
            && validator.stake.units() >= Amount::from_integer(MIN_STAKE).units()
    }
}
