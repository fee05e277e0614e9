use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use bt2c_core::{
    Address, Amount, ReputationMetrics, UnstakeRequest, UnstakeStatus, Validator, ValidatorStatus,
    MIN_STAKE,
};

use crate::error::ConsensusError;
use crate::reputation::calculate_apy;
use crate::slasher::{Evidence, Penalty, SlashReason, Slasher};

/// Throughput normalization ceiling (tx/min) at which the normalized
/// throughput score in [`ReputationMetrics::throughput`] saturates at 1.0.
/// Shared with [`crate::reputation`], whose tx/min breakpoints are defined
/// against this same ceiling.
pub(crate) const THROUGHPUT_CAP_TX_PER_MIN: f64 = 100.0;
/// Smoothing factor for the response-time and throughput exponential
/// moving averages in [`ValidatorSet::update_metrics`].
const METRICS_EMA_ALPHA: f64 = 0.1;

struct State {
    validators: HashMap<Address, Validator>,
    exit_queue: VecDeque<UnstakeRequest>,
    /// Set once the first distribution-window registrant has claimed the
    /// one-time developer reward.
    developer_reward_claimed: bool,
}

/// The set of registered validators: their stakes, statuses, and the exit
/// queue unstake requests pass through before funds become claimable.
pub struct ValidatorSet {
    state: RwLock<State>,
    config: ChainConfig,
    genesis_timestamp: u64,
}

use bt2c_config::ChainConfig;

impl ValidatorSet {
    pub fn new(config: ChainConfig, genesis_timestamp: u64) -> Self {
        Self {
            state: RwLock::new(State {
                validators: HashMap::new(),
                exit_queue: VecDeque::new(),
                developer_reward_claimed: false,
            }),
            config,
            genesis_timestamp,
        }
    }

    fn within_distribution_window(&self, joined_at: u64) -> bool {
        let window_secs = self.config.distribution_period_days * 86_400;
        joined_at.saturating_sub(self.genesis_timestamp) <= window_secs
    }

    /// Registers a new validator. During the network's distribution
    /// window, the first ever registrant additionally receives the
    /// one-time developer reward, and every registrant in the window
    /// receives the smaller per-registrant distribution reward — both
    /// credited straight to the validator's self-stake.
    pub fn register(
        &self,
        address: Address,
        public_key: Vec<u8>,
        stake: Amount,
        commission_rate: f64,
        joined_at: u64,
    ) -> Result<Amount, ConsensusError> {
        if stake.units() < self.config.min_stake.units() {
            return Err(ConsensusError::BelowMinimumStake {
                min: self.config.min_stake.to_string(),
                got: stake.to_string(),
            });
        }
        let mut state = self.state.write();
        if state.validators.contains_key(&address) {
            return Err(ConsensusError::AlreadyRegistered(address));
        }

        let mut bonus = Amount::ZERO;
        if self.within_distribution_window(joined_at) {
            bonus = bonus.checked_add(self.config.distribution_reward).unwrap_or(bonus);
            if !state.developer_reward_claimed {
                state.developer_reward_claimed = true;
                bonus = bonus.checked_add(self.config.developer_reward).unwrap_or(bonus);
            }
        }
        let total_stake = stake.checked_add(bonus).unwrap_or(stake);

        state.validators.insert(
            address.clone(),
            Validator {
                address,
                public_key,
                stake: total_stake,
                status: ValidatorStatus::Active,
                commission_rate,
                joined_at,
                metrics: ReputationMetrics::default(),
                consecutive_selections: 0,
                blocks_produced: 0,
                blocks_missed: 0,
                last_block_time: joined_at,
                jailed_at: None,
                slash_points: 0,
                rewards_earned: Amount::ZERO,
                delegations: Default::default(),
            },
        );
        Ok(bonus)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn get(&self, address: &Address) -> Option<Validator> {
        self.state.read().validators.get(address).cloned()
    }

    /// Snapshot of the exit queue in FIFO order, for inspecting queue
    /// positions and wait estimates without mutating anything.
    pub fn get_exit_queue_snapshot(&self) -> Vec<UnstakeRequest> {
        self.state.read().exit_queue.iter().cloned().collect()
    }

    pub fn all_active(&self, current_height: u64) -> Vec<Validator> {
        self.state
            .read()
            .validators
            .values()
            .filter(|v| v.is_eligible_for_selection(current_height))
            .cloned()
            .collect()
    }

    pub fn total_stake(&self) -> Amount {
        self.state
            .read()
            .validators
            .values()
            .fold(Amount::ZERO, |acc, v| {
                acc.checked_add(v.total_stake()).unwrap_or(acc)
            })
    }

    pub fn add_stake(&self, address: &Address, amount: Amount) -> Result<(), ConsensusError> {
        let mut state = self.state.write();
        let validator = state
            .validators
            .get_mut(address)
            .ok_or_else(|| ConsensusError::NotFound(address.clone()))?;
        if validator.status.is_terminal() {
            return Err(ConsensusError::Tombstoned(address.clone()));
        }
        validator.stake = validator.stake.checked_add(amount).unwrap_or(validator.stake);
        Ok(())
    }

    pub fn delegate(
        &self,
        validator_address: &Address,
        delegator: Address,
        amount: Amount,
    ) -> Result<(), ConsensusError> {
        let mut state = self.state.write();
        let validator = state
            .validators
            .get_mut(validator_address)
            .ok_or_else(|| ConsensusError::NotFound(validator_address.clone()))?;
        if validator.status.is_terminal() {
            return Err(ConsensusError::Tombstoned(validator_address.clone()));
        }
        let entry = validator.delegations.entry(delegator).or_insert(Amount::ZERO);
        *entry = entry.checked_add(amount).unwrap_or(*entry);
        Ok(())
    }

    /// Queues a full or partial unstake. Rejects a partial withdrawal that
    /// would leave the validator's self-stake in `(0, MIN_STAKE)` — "all or
    /// enough". The validator moves to `Unstaking` if this drains its
    /// self-stake entirely; the withdrawal matures after the network's
    /// unbonding period, stretched by a congestion multiplier when the exit
    /// queue is backed up.
    pub fn request_unstake(
        &self,
        address: &Address,
        amount: Amount,
        current_height: u64,
    ) -> Result<UnstakeRequest, ConsensusError> {
        let mut state = self.state.write();
        let queue_len = state.exit_queue.len();
        let validator = state
            .validators
            .get_mut(address)
            .ok_or_else(|| ConsensusError::NotFound(address.clone()))?;
        if validator.stake.units() < amount.units() {
            return Err(ConsensusError::InsufficientStake(address.clone()));
        }
        let remaining = validator.stake.checked_sub(amount).unwrap_or(Amount::ZERO);
        let min_stake = Amount::from_integer(MIN_STAKE);
        if !remaining.is_zero() && remaining.units() < min_stake.units() {
            return Err(ConsensusError::PartialUnstakeBelowMinimum {
                requested: amount.to_string(),
                remaining: remaining.to_string(),
                min: min_stake.to_string(),
            });
        }

        validator.stake = remaining;
        if validator.stake.is_zero() {
            validator.status = ValidatorStatus::Unstaking;
        }

        let congestion_multiplier = 1.0 + (queue_len as f64 / 50.0).min(2.0);
        let max_wait_blocks =
            self.config.max_exit_queue_days * 86_400 / self.config.block_time_secs.max(1);
        let wait_blocks = ((self.config.unbonding_period_blocks as f64 * congestion_multiplier) as u64)
            .min(max_wait_blocks.max(self.config.unbonding_period_blocks));
        let queue_position = state
            .exit_queue
            .iter()
            .filter(|r| r.status == UnstakeStatus::Queued)
            .count()
            + 1;
        let request = UnstakeRequest {
            validator: address.clone(),
            amount,
            requested_at_height: current_height,
            matures_at_height: current_height + wait_blocks,
            queue_position,
            status: UnstakeStatus::Queued,
        };
        state.exit_queue.push_back(request.clone());
        Ok(request)
    }

    /// Re-numbers `queue_position` across the still-`Queued` entries so it
    /// always reflects each request's FIFO distance from the front of the
    /// line, regardless of how many entries ahead of it have since left the
    /// `Queued` state.
    fn reindex_queue_positions(state: &mut State) {
        let mut position = 1usize;
        for request in state.exit_queue.iter_mut() {
            if request.status == UnstakeStatus::Queued {
                request.queue_position = position;
                position += 1;
            }
        }
    }

    /// Moves up to `max_count` matured queued requests to `Ready`, oldest
    /// first, and returns them for payout. This is the congestion-gated
    /// exit-queue throttle: even when more requests are mature, only the
    /// front `max_count` of them are released in a single call, and every
    /// request still behind them has its `queue_position` re-indexed to
    /// reflect the entries that just left the line. Pass `usize::MAX` for
    /// an uncapped drain of everything that has matured.
    pub fn process_exit_queue(&self, current_height: u64, max_count: usize) -> Vec<UnstakeRequest> {
        let mut state = self.state.write();
        let mut matured = Vec::new();
        for request in state.exit_queue.iter_mut() {
            if matured.len() >= max_count {
                break;
            }
            if request.status == UnstakeStatus::Queued && request.is_mature(current_height) {
                request.status = UnstakeStatus::Ready;
                matured.push(request.clone());
            }
        }
        Self::reindex_queue_positions(&mut state);
        matured
    }

    /// Marks a ready request as paid out and removes it, finalizing the
    /// exit: if the validator has no remaining stake or delegations, it
    /// transitions to `Inactive`.
    pub fn complete_unstake(&self, validator: &Address, index_in_queue: usize) -> Option<UnstakeRequest> {
        let mut state = self.state.write();
        if index_in_queue >= state.exit_queue.len() {
            return None;
        }
        if state.exit_queue[index_in_queue].validator != *validator {
            return None;
        }
        if state.exit_queue[index_in_queue].status != UnstakeStatus::Ready {
            return None;
        }
        let mut request = state.exit_queue.remove(index_in_queue)?;
        request.status = UnstakeStatus::Completed;
        if let Some(v) = state.validators.get_mut(validator) {
            if v.status == ValidatorStatus::Unstaking && v.stake.is_zero() && v.delegations.is_empty() {
                v.status = ValidatorStatus::Inactive;
            }
        }
        Self::reindex_queue_positions(&mut state);
        Some(request)
    }

    /// Removes and finalizes the oldest `Ready` unstake request queued for
    /// `validator`, mirroring [`Self::complete_unstake`] without requiring
    /// the caller to track queue positions externally (positions shift as
    /// earlier entries are removed, so a caller driving several validators'
    /// payouts off of [`Self::process_exit_queue`]'s snapshot would
    /// otherwise have to recompute indices after every removal).
    pub fn complete_next_ready_unstake(&self, validator: &Address) -> Option<UnstakeRequest> {
        let mut state = self.state.write();
        let index = state
            .exit_queue
            .iter()
            .position(|r| &r.validator == validator && r.status == UnstakeStatus::Ready)?;
        let mut request = state.exit_queue.remove(index)?;
        request.status = UnstakeStatus::Completed;
        if let Some(v) = state.validators.get_mut(validator) {
            if v.status == ValidatorStatus::Unstaking && v.stake.is_zero() && v.delegations.is_empty() {
                v.status = ValidatorStatus::Inactive;
            }
        }
        Self::reindex_queue_positions(&mut state);
        Some(request)
    }

    /// Rolls a freshly observed block into `address`'s reputation metrics:
    /// an exponential moving average (`alpha = 0.1`) for response time and
    /// throughput, and a running mean of block validity over
    /// `total_blocks` seen so far. Call before [`Self::record_block_produced`]
    /// (which bumps `total_blocks`) so the running mean divides by the
    /// count excluding this block.
    pub fn update_metrics(
        &self,
        address: &Address,
        response_time_ms: f64,
        block_was_valid: bool,
        tx_count: u64,
    ) -> Result<(), ConsensusError> {
        let mut state = self.state.write();
        let validator = state
            .validators
            .get_mut(address)
            .ok_or_else(|| ConsensusError::NotFound(address.clone()))?;
        let total_blocks = validator.blocks_produced as f64;
        let throughput_sample = (tx_count as f64 / THROUGHPUT_CAP_TX_PER_MIN).min(1.0);
        let m = &mut validator.metrics;
        m.response_time_ms =
            METRICS_EMA_ALPHA * response_time_ms + (1.0 - METRICS_EMA_ALPHA) * m.response_time_ms;
        m.throughput = METRICS_EMA_ALPHA * throughput_sample + (1.0 - METRICS_EMA_ALPHA) * m.throughput;
        m.block_accuracy =
            (m.block_accuracy * total_blocks + if block_was_valid { 1.0 } else { 0.0 }) / (total_blocks + 1.0);
        Ok(())
    }

    pub fn record_block_produced(&self, address: &Address, at_time: u64) {
        let mut state = self.state.write();
        if let Some(v) = state.validators.get_mut(address) {
            v.blocks_produced += 1;
            v.last_block_time = at_time;
        }
    }

    pub fn record_block_missed(&self, address: &Address) {
        let mut state = self.state.write();
        if let Some(v) = state.validators.get_mut(address) {
            v.blocks_missed += 1;
        }
    }

    pub fn credit_reward(&self, address: &Address, amount: Amount) -> Result<(), ConsensusError> {
        let mut state = self.state.write();
        let validator = state
            .validators
            .get_mut(address)
            .ok_or_else(|| ConsensusError::NotFound(address.clone()))?;
        validator.rewards_earned = validator.rewards_earned.checked_add(amount).unwrap_or(validator.rewards_earned);
        Ok(())
    }

    pub fn apy_for(&self, address: &Address, now: u64) -> Result<f64, ConsensusError> {
        let state = self.state.read();
        let validator = state
            .validators
            .get(address)
            .ok_or_else(|| ConsensusError::NotFound(address.clone()))?;
        let total_stake = state
            .validators
            .values()
            .fold(Amount::ZERO, |acc, v| acc.checked_add(v.total_stake()).unwrap_or(acc));
        Ok(calculate_apy(
            validator.total_stake(),
            validator.participation_days(now),
            total_stake,
            &validator.metrics,
            &self.config,
        ))
    }

    /// Applies slashing evidence to the named validator: burns the
    /// appropriate stake fraction (if any), accrues a slash-point for
    /// graduated offenses, and transitions status per [`Slasher::evaluate`].
    /// Returns the computed penalty so the caller can log/propagate it.
    pub fn apply_evidence(&self, evidence: &Evidence, now: u64) -> Result<Penalty, ConsensusError> {
        let mut state = self.state.write();
        let validator = state
            .validators
            .get_mut(&evidence.validator)
            .ok_or_else(|| ConsensusError::NotFound(evidence.validator.clone()))?;
        if validator.status.is_terminal() {
            return Err(ConsensusError::Tombstoned(evidence.validator.clone()));
        }

        if evidence.reason == SlashReason::InvalidBlock {
            validator.slash_points += 1;
        }
        let penalty = Slasher::evaluate(
            evidence,
            validator.total_stake(),
            validator.slash_points,
            self.config.slash_jail_threshold,
        );

        if !penalty.slashed.is_zero() {
            validator.stake = validator.stake.saturating_sub(penalty.slashed);
        }
        validator.status = penalty.new_status;
        if validator.status == ValidatorStatus::Jailed {
            validator.jailed_at = Some(now);
        }
        Ok(penalty)
    }

    /// Attempts to recover a jailed validator: succeeds only once the
    /// configured wait period has elapsed since `jailed_at` and residual
    /// stake still clears the minimum. On success slash-points reset and
    /// status moves to `Inactive`, re-entering the active set on its next
    /// `stake`/metrics update per the spec's recovery wording.
    pub fn unjail(&self, address: &Address, now: u64) -> Result<(), ConsensusError> {
        let mut state = self.state.write();
        let validator = state
            .validators
            .get_mut(address)
            .ok_or_else(|| ConsensusError::NotFound(address.clone()))?;
        if validator.status != ValidatorStatus::Jailed {
            return Err(ConsensusError::NotJailed(address.clone()));
        }
        let wait_period_secs = self.config.unjail_wait_days * 86_400;
        if !Slasher::can_unjail(validator, now, wait_period_secs) {
            return Err(ConsensusError::UnjailWaitPeriodNotElapsed(address.clone()));
        }
        validator.slash_points = 0;
        validator.jailed_at = None;
        validator.status = ValidatorStatus::Inactive;
        Ok(())
    }

    /// Reactivates an `Inactive` validator that still clears the minimum
    /// stake — the "re-enters the active set on next update" half of the
    /// unjail recovery path.
    pub fn reactivate(&self, address: &Address) -> Result<(), ConsensusError> {
        let mut state = self.state.write();
        let validator = state
            .validators
            .get_mut(address)
            .ok_or_else(|| ConsensusError::NotFound(address.clone()))?;
        if validator.status != ValidatorStatus::Inactive {
            return Ok(());
        }
        if validator.stake.units() < Amount::from_integer(MIN_STAKE).units() {
            return Err(ConsensusError::BelowMinimumStake {
                min: Amount::from_integer(MIN_STAKE).to_string(),
                got: validator.stake.to_string(),
            });
        }
        validator.status = ValidatorStatus::Active;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt2c_config::NetworkType;
    use std::str::FromStr;

    fn addr(c: char) -> Address {
        Address::parse(&format!("bt2c_{}", c.to_string().repeat(26))).unwrap()
    }

    fn set() -> ValidatorSet {
        ValidatorSet::new(ChainConfig::for_network(NetworkType::Devnet), 0)
    }

    #[test]
    fn register_requires_minimum_stake() {
        let vs = set();
        let err = vs
            .register(addr('a'), vec![], Amount::from_units(0), 0.1, 0)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::BelowMinimumStake { .. }));
    }

    #[test]
    fn first_registrant_in_distribution_window_gets_developer_reward() {
        let mut cfg = ChainConfig::for_network(NetworkType::Devnet);
        cfg.distribution_period_days = 14;
        let vs = ValidatorSet::new(cfg, 0);
        let bonus_a = vs.register(addr('a'), vec![], Amount::from_integer(10), 0.1, 0).unwrap();
        let bonus_b = vs.register(addr('b'), vec![], Amount::from_integer(10), 0.1, 0).unwrap();
        assert_eq!(bonus_a.to_string(), "101.00000000");
        assert_eq!(bonus_b.to_string(), "1.00000000");
        assert_eq!(vs.get(&addr('a')).unwrap().stake.to_string(), "111.00000000");
    }

    #[test]
    fn registration_outside_distribution_window_gets_no_bonus() {
        let mut cfg = ChainConfig::for_network(NetworkType::Devnet);
        cfg.distribution_period_days = 1;
        let vs = ValidatorSet::new(cfg, 0);
        let bonus = vs
            .register(addr('a'), vec![], Amount::from_integer(10), 0.1, 10 * 86_400)
            .unwrap();
        assert!(bonus.is_zero());
    }

    #[test]
    fn exit_queue_matures_after_unbonding_period() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(10), 0.1, 0)
            .unwrap();
        let req = vs.request_unstake(&addr('a'), Amount::from_integer(10), 0).unwrap();
        assert!(vs.process_exit_queue(req.matures_at_height - 1, usize::MAX).is_empty());
        assert_eq!(vs.process_exit_queue(req.matures_at_height, usize::MAX).len(), 1);
    }

    #[test]
    fn exit_queue_batch_cap_throttles_release_and_reindexes_positions() {
        let vs = set();
        for c in ['a', 'b', 'c'] {
            vs.register(addr(c), vec![], Amount::from_integer(10), 0.1, 0)
                .unwrap();
        }
        let r1 = vs.request_unstake(&addr('a'), Amount::from_integer(10), 0).unwrap();
        let r2 = vs.request_unstake(&addr('b'), Amount::from_integer(10), 0).unwrap();
        let r3 = vs.request_unstake(&addr('c'), Amount::from_integer(10), 0).unwrap();
        assert_eq!((r1.queue_position, r2.queue_position, r3.queue_position), (1, 2, 3));

        let released = vs.process_exit_queue(r3.matures_at_height, 2);
        assert_eq!(released.len(), 2);
        assert_eq!(released[0].validator, addr('a'));
        assert_eq!(released[1].validator, addr('b'));

        let c_pending = vs
            .get_exit_queue_snapshot()
            .into_iter()
            .find(|r| r.validator == addr('c'))
            .unwrap();
        assert_eq!(c_pending.queue_position, 1);
    }

    #[test]
    fn full_unstake_moves_validator_to_unstaking() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(10), 0.1, 0)
            .unwrap();
        vs.request_unstake(&addr('a'), Amount::from_integer(10), 0).unwrap();
        assert_eq!(vs.get(&addr('a')).unwrap().status, ValidatorStatus::Unstaking);
    }

    #[test]
    fn partial_unstake_below_minimum_is_rejected() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_str("10").unwrap(), 0.1, 0)
            .unwrap();
        let err = vs
            .request_unstake(&addr('a'), Amount::from_str("9.99999999").unwrap(), 0)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::PartialUnstakeBelowMinimum { .. }));
    }

    #[test]
    fn double_sign_evidence_tombstones_and_zeroes_stake() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(100), 0.1, 0)
            .unwrap();
        let evidence = Evidence {
            validator: addr('a'),
            reason: SlashReason::DoubleSign,
            height: 10,
            detail: String::new(),
        };
        let penalty = vs.apply_evidence(&evidence, 100).unwrap();
        assert_eq!(penalty.new_status, ValidatorStatus::Tombstoned);
        let v = vs.get(&addr('a')).unwrap();
        assert_eq!(v.status, ValidatorStatus::Tombstoned);
        assert!(v.stake.is_zero());
    }

    #[test]
    fn invalid_block_evidence_jails_after_threshold_points() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(100), 0.1, 0)
            .unwrap();
        let evidence = Evidence {
            validator: addr('a'),
            reason: SlashReason::InvalidBlock,
            height: 10,
            detail: String::new(),
        };
        for _ in 0..4 {
            vs.apply_evidence(&evidence, 100).unwrap();
        }
        assert_eq!(vs.get(&addr('a')).unwrap().status, ValidatorStatus::Active);
        vs.apply_evidence(&evidence, 100).unwrap();
        assert_eq!(vs.get(&addr('a')).unwrap().status, ValidatorStatus::Jailed);
    }

    #[test]
    fn unjail_requires_wait_period() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(100), 0.1, 0)
            .unwrap();
        let evidence = Evidence {
            validator: addr('a'),
            reason: SlashReason::ByzantineRatio,
            height: 10,
            detail: String::new(),
        };
        vs.apply_evidence(&evidence, 100).unwrap();
        assert!(matches!(
            vs.unjail(&addr('a'), 100),
            Err(ConsensusError::UnjailWaitPeriodNotElapsed(_))
        ));
        let wait = vs.config().unjail_wait_days * 86_400;
        vs.unjail(&addr('a'), 100 + wait).unwrap();
        assert_eq!(vs.get(&addr('a')).unwrap().status, ValidatorStatus::Inactive);
    }

    #[test]
    fn jailed_validators_are_excluded_from_active_set() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(10), 0.1, 0)
            .unwrap();
        let evidence = Evidence {
            validator: addr('a'),
            reason: SlashReason::ByzantineRatio,
            height: 10,
            detail: String::new(),
        };
        vs.apply_evidence(&evidence, 100).unwrap();
        assert!(vs.all_active(50).is_empty());
    }

    #[test]
    fn apy_reflects_stake_and_tenure() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_str("50").unwrap(), 0.1, 0)
            .unwrap();
        let apy = vs.apy_for(&addr('a'), 86_400 * 400).unwrap();
        assert!(apy > 0.0);
    }

    #[test]
    fn complete_next_ready_unstake_finds_the_oldest_ready_request() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(10), 0.1, 0).unwrap();
        let req = vs.request_unstake(&addr('a'), Amount::from_integer(10), 0).unwrap();
        assert!(vs.complete_next_ready_unstake(&addr('a')).is_none());
        vs.process_exit_queue(req.matures_at_height, usize::MAX);
        let completed = vs.complete_next_ready_unstake(&addr('a')).unwrap();
        assert_eq!(completed.status, UnstakeStatus::Completed);
        assert_eq!(vs.get(&addr('a')).unwrap().status, ValidatorStatus::Inactive);
        assert!(vs.complete_next_ready_unstake(&addr('a')).is_none());
    }

    #[test]
    fn update_metrics_moves_response_time_toward_the_sample() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(10), 0.1, 0)
            .unwrap();
        vs.update_metrics(&addr('a'), 400.0, true, 10).unwrap();
        let after_one = vs.get(&addr('a')).unwrap().metrics.response_time_ms;
        assert!((after_one - 40.0).abs() < 1e-9);
        for _ in 0..50 {
            vs.update_metrics(&addr('a'), 400.0, true, 10).unwrap();
        }
        let converged = vs.get(&addr('a')).unwrap().metrics.response_time_ms;
        assert!((converged - 400.0).abs() < 1.0);
    }

    #[test]
    fn update_metrics_tracks_running_mean_of_validity() {
        let vs = set();
        vs.register(addr('a'), vec![], Amount::from_integer(10), 0.1, 0)
            .unwrap();
        vs.update_metrics(&addr('a'), 100.0, false, 5).unwrap();
        vs.record_block_produced(&addr('a'), 1);
        vs.update_metrics(&addr('a'), 100.0, true, 5).unwrap();
        vs.record_block_produced(&addr('a'), 2);
        assert_eq!(vs.get(&addr('a')).unwrap().metrics.block_accuracy, 0.5);
    }
}
