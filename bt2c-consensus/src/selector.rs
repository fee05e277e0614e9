use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use bt2c_core::{sha256, Address, Hash, Validator};

use crate::error::ConsensusError;
use crate::reputation::reputation_multiplier;

/// Number of past selections folded into the seed and used for the
/// anti-monoculture streak check's fairness-report counterpart.
const SELECTION_HISTORY_DEPTH: usize = 20;

/// Selection-history bookkeeping used both to drive the anti-monoculture
/// redraw and to compute fairness-distribution statistics.
struct History {
    selection_counts: HashMap<Address, u64>,
    total_selections: u64,
    last_selected: Option<Address>,
    consecutive_count: u32,
    longest_streak: u32,
    /// Most recent selections, newest last, capped at
    /// [`SELECTION_HISTORY_DEPTH`] — folded into the next seed so a
    /// validator can't profitably grind on any single input without also
    /// controlling the chain of selections that produced it.
    recent: VecDeque<Address>,
    /// Running entropy accumulator: `pool <- SHA-256(pool || seed)` after
    /// every draw, binding each seed to all prior ones.
    entropy_pool: Hash,
}

impl Default for History {
    fn default() -> Self {
        Self {
            selection_counts: HashMap::new(),
            total_selections: 0,
            last_selected: None,
            consecutive_count: 0,
            longest_streak: 0,
            recent: VecDeque::with_capacity(SELECTION_HISTORY_DEPTH),
            entropy_pool: bt2c_core::ZERO_HASH,
        }
    }
}

/// Per-round inputs that seed the selection draw: everything the spec
/// requires binding the seed to (chain tip, chain history, prior entropy)
/// so a validator can't grind a favorable outcome without also
/// controlling the block hash chain.
pub struct SeedInputs<'a> {
    pub timestamp_millis: u64,
    pub previous_hash: &'a Hash,
    pub previous_height: u64,
    pub previous_transactions_hash: &'a Hash,
    pub previous_validator: &'a Address,
}

/// VRF-seeded, stake-weighted validator selection with a fairness
/// adjustment (validators selected less than their stake share suggests
/// get a boosted weight next round, and vice versa) and an anti-monoculture
/// redraw that forces a different validator once one has been picked too
/// many times in a row.
pub struct ValidatorSelector {
    history: RwLock<History>,
}

impl Default for ValidatorSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorSelector {
    pub fn new() -> Self {
        Self {
            history: RwLock::new(History::default()),
        }
    }

    /// History-bound selection seed. Combines the round's chain-state
    /// inputs with the running entropy pool and a hash of the last
    /// [`SELECTION_HISTORY_DEPTH`] selections, so no single input —
    /// including the block hash chain alone — determines the outcome.
    fn generate_seed(inputs: &SeedInputs, history: &History) -> Hash {
        let recent_hash = hash_addresses(history.recent.iter());
        let mut sorted_fields: Vec<&[u8]> = vec![
            inputs.previous_hash.as_slice(),
            inputs.previous_transactions_hash.as_slice(),
            inputs.previous_validator.as_str().as_bytes(),
        ];
        sorted_fields.sort_unstable();
        let mut sorted_hash_input = Vec::new();
        for field in sorted_fields {
            sorted_hash_input.extend_from_slice(field);
        }
        let sorted_fields_hash = sha256(&sorted_hash_input);

        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&inputs.timestamp_millis.to_be_bytes());
        buf.extend_from_slice(inputs.previous_hash);
        buf.extend_from_slice(&inputs.previous_height.to_be_bytes());
        buf.extend_from_slice(inputs.previous_transactions_hash);
        buf.extend_from_slice(inputs.previous_validator.as_str().as_bytes());
        buf.extend_from_slice(&history.entropy_pool);
        buf.extend_from_slice(&recent_hash);
        buf.extend_from_slice(&sorted_fields_hash);
        sha256(&buf)
    }

    /// Multiplier applied to a validator's stake weight based on how its
    /// actual selection share compares to its stake-implied expected
    /// share. A validator never selected before gets the maximum boost;
    /// underrepresented validators are boosted by `expected/actual`, with
    /// an extra `1.5x` kicker if they're underrepresented by more than
    /// half; overrepresented validators are dampened the same way, with a
    /// `0.75x` kicker if they're overrepresented by more than double. The
    /// result is always clamped to `[0.3, 3.0]`.
    fn fairness_multiplier(actual_share: f64, expected_share: f64) -> f64 {
        if actual_share <= 0.0 {
            return 3.0;
        }
        let mut adjustment = expected_share / actual_share;
        if actual_share < expected_share {
            if actual_share < expected_share / 2.0 {
                adjustment *= 1.5;
            }
        } else if actual_share > expected_share * 2.0 {
            adjustment *= 0.75;
        }
        adjustment.clamp(0.3, 3.0)
    }

    fn adjusted_weight(v: &Validator, history: &History, total_stake: f64, now: u64) -> (Address, f64) {
        let stake = v.total_stake().to_f64();
        let expected_share = if total_stake > 0.0 { stake / total_stake } else { 0.0 };
        let actual_share = *history.selection_counts.get(&v.address).unwrap_or(&0) as f64
            / history.total_selections.max(1) as f64;
        let reputation = reputation_multiplier(&v.metrics, v.participation_days(now));
        let fairness = Self::fairness_multiplier(actual_share, expected_share);
        (v.address.clone(), stake * reputation * fairness)
    }

    fn weighted_draw(
        &self,
        candidates: &[&Validator],
        history: &History,
        now: u64,
        rng: &mut ChaCha20Rng,
    ) -> Option<Address> {
        let total_stake: f64 = candidates.iter().map(|v| v.total_stake().to_f64()).sum();
        if total_stake <= 0.0 {
            return None;
        }

        let weights: Vec<(Address, f64)> = candidates
            .iter()
            .map(|v| Self::adjusted_weight(v, history, total_stake, now))
            .collect();

        let total_weight: f64 = weights.iter().map(|(_, w)| w).sum();
        if total_weight <= 0.0 {
            return None;
        }
        let mut pick = rng.gen_range(0.0..total_weight);
        for (addr, weight) in &weights {
            if pick < *weight {
                return Some(addr.clone());
            }
            pick -= weight;
        }
        weights.last().map(|(a, _)| a.clone())
    }

    /// Selects the validator to propose the next block, given the round's
    /// seed inputs and the set of currently eligible validators. `now` (unix
    /// seconds) feeds the reputation multiplier's duration factor.
    pub fn select(
        &self,
        inputs: &SeedInputs,
        now: u64,
        eligible: &[Validator],
    ) -> Result<Address, ConsensusError> {
        if eligible.is_empty() {
            return Err(ConsensusError::NoEligibleValidators);
        }

        let mut history = self.history.write();
        let seed = Self::generate_seed(inputs, &history);
        let mut rng = ChaCha20Rng::from_seed(seed);

        let refs: Vec<&Validator> = eligible.iter().collect();
        let mut chosen = self
            .weighted_draw(&refs, &history, now, &mut rng)
            .ok_or(ConsensusError::NoEligibleValidators)?;

        let monoculture_threshold = eligible.len().min(3) as u32;
        let is_repeat = history.last_selected.as_ref() == Some(&chosen);
        let would_exceed = is_repeat && history.consecutive_count + 1 >= monoculture_threshold;
        if would_exceed && eligible.len() > 1 {
            // Redraw with a fresh seed (seed || 8 extra entropy bytes),
            // excluding the over-selected incumbent entirely.
            let mut redraw_seed_material = seed.to_vec();
            redraw_seed_material.extend_from_slice(&rng.gen::<[u8; 8]>());
            let mut redraw_rng = ChaCha20Rng::from_seed(sha256(&redraw_seed_material));
            let without_incumbent: Vec<&Validator> =
                refs.iter().copied().filter(|v| v.address != chosen).collect();
            if let Some(redraw) = self.weighted_draw(&without_incumbent, &history, now, &mut redraw_rng) {
                chosen = redraw;
            }
        }

        if history.last_selected.as_ref() == Some(&chosen) {
            history.consecutive_count += 1;
        } else {
            history.last_selected = Some(chosen.clone());
            history.consecutive_count = 1;
        }
        history.longest_streak = history.longest_streak.max(history.consecutive_count);
        *history.selection_counts.entry(chosen.clone()).or_insert(0) += 1;
        history.total_selections += 1;
        if history.recent.len() == SELECTION_HISTORY_DEPTH {
            history.recent.pop_front();
        }
        history.recent.push_back(chosen.clone());
        history.entropy_pool = sha256(&[history.entropy_pool.as_slice(), seed.as_slice()].concat());

        Ok(chosen)
    }

    pub fn analyze_distribution(&self, validator_count: usize) -> DistributionReport {
        let history = self.history.read();
        analyze_counts(
            &history.selection_counts,
            history.total_selections,
            validator_count,
            history.longest_streak,
        )
    }
}

fn hash_addresses<'a>(addresses: impl Iterator<Item = &'a Address>) -> Hash {
    let mut buf = Vec::new();
    for addr in addresses {
        buf.extend_from_slice(addr.as_str().as_bytes());
    }
    sha256(&buf)
}

/// Fairness statistics over a history of validator selections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionReport {
    pub total_selections: u64,
    pub chi_square: f64,
    pub gini_coefficient: f64,
    pub max_deviation: f64,
    pub longest_streak: u32,
    /// True iff the chi-square statistic's approximate p-value exceeds
    /// 0.05 (Wilson-Hilferty normal approximation, since this workspace
    /// has no dependency on a statistics crate for the exact chi-square
    /// CDF).
    pub fair_distribution: bool,
    /// True iff `max_deviation < 20%` and `longest_streak <= 2`.
    pub resistant_to_grinding: bool,
}

fn analyze_counts(
    counts: &HashMap<Address, u64>,
    total_selections: u64,
    validator_count: usize,
    longest_streak: u32,
) -> DistributionReport {
    if validator_count == 0 || total_selections == 0 {
        return DistributionReport {
            total_selections,
            chi_square: 0.0,
            gini_coefficient: 0.0,
            max_deviation: 0.0,
            longest_streak,
            fair_distribution: true,
            resistant_to_grinding: true,
        };
    }

    let expected = total_selections as f64 / validator_count as f64;
    let mut observed: Vec<f64> = counts.values().map(|c| *c as f64).collect();
    while observed.len() < validator_count {
        observed.push(0.0);
    }

    let chi_square: f64 = observed
        .iter()
        .map(|o| (o - expected).powi(2) / expected.max(1e-9))
        .sum();

    let max_deviation = observed
        .iter()
        .map(|o| (o - expected).abs() / expected.max(1e-9))
        .fold(0.0, f64::max);

    let mut sorted = observed.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let sum: f64 = sorted.iter().sum();
    let gini_coefficient = if sum <= 0.0 {
        0.0
    } else {
        let weighted_sum: f64 = sorted
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64 + 1.0) * v)
            .sum();
        (2.0 * weighted_sum) / (n * sum) - (n + 1.0) / n
    };

    let degrees_of_freedom = (validator_count as f64 - 1.0).max(1.0);
    let fair_distribution = chi_square_p_value_exceeds_005(chi_square, degrees_of_freedom);

    DistributionReport {
        total_selections,
        chi_square,
        gini_coefficient,
        max_deviation,
        longest_streak,
        fair_distribution,
        resistant_to_grinding: max_deviation < 0.20 && longest_streak <= 2,
    }
}

/// Wilson-Hilferty normal approximation of the chi-square CDF, used to
/// approximate whether `p > 0.05` for the goodness-of-fit test without
/// pulling in a statistics crate.
fn chi_square_p_value_exceeds_005(chi_square: f64, k: f64) -> bool {
    let h = 2.0 / (9.0 * k);
    let z = ((chi_square / k).powf(1.0 / 3.0) - (1.0 - h)) / h.sqrt();
    z < 1.645
}
