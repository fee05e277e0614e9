use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;

/// Minimum stake required to register as a validator.
pub const MIN_STAKE: u64 = 1;

/// A validator's position in its lifecycle. Validators move
/// `Active -> Jailed -> Active` on slashing/unjailing (recoverable),
/// `Active -> Tombstoned` on the most severe offenses (permanent), and
/// `Active -> Unstaking -> Inactive` when they withdraw their stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    Active,
    Inactive,
    Jailed,
    Tombstoned,
    Unstaking,
}

impl ValidatorStatus {
    /// Tombstoning is the only terminal state; every other transition can
    /// in principle be reversed by re-staking or unjailing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ValidatorStatus::Tombstoned)
    }
}

/// Rolling performance metrics feeding the reputation multiplier.
/// Each is a fraction in `[0, 1]` except `response_time_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationMetrics {
    pub uptime: f64,
    pub block_accuracy: f64,
    pub response_time_ms: f64,
    pub throughput: f64,
}

impl Default for ReputationMetrics {
    fn default() -> Self {
        Self {
            uptime: 1.0,
            block_accuracy: 1.0,
            response_time_ms: 0.0,
            throughput: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    /// DER-encoded public key, used to verify blocks this validator signs.
    pub public_key: Vec<u8>,
    pub stake: Amount,
    pub status: ValidatorStatus,
    pub commission_rate: f64,
    /// Unix timestamp this validator first registered.
    pub joined_at: u64,
    pub metrics: ReputationMetrics,
    /// Consecutive selections since the last anti-monoculture redraw reset.
    pub consecutive_selections: u32,
    /// Total blocks produced, used for Byzantine block-production ratio checks.
    pub blocks_produced: u64,
    /// Total blocks missed while active (failed to propose when selected).
    pub blocks_missed: u64,
    /// Unix timestamp of this validator's most recently produced block;
    /// the jailing wait period is measured from here, not from the moment
    /// of jailing.
    pub last_block_time: u64,
    /// Unix timestamp the validator was jailed at, if currently jailed.
    /// `None` once unjailed.
    pub jailed_at: Option<u64>,
    /// Accumulated slash-points from graduated offenses (invalid blocks).
    /// Reaching the configured threshold triggers jailing; double-sign and
    /// Byzantine-ratio evidence jail/tombstone immediately and don't wait
    /// on this counter.
    pub slash_points: u32,
    /// Lifetime rewards credited to this validator (subsidy share plus
    /// commission), in the native fixed-point unit.
    pub rewards_earned: Amount,
    /// Delegated stake by delegator address, separate from `stake` (self-stake).
    pub delegations: std::collections::BTreeMap<Address, Amount>,
}

impl Validator {
    pub fn total_stake(&self) -> Amount {
        self.delegations
            .values()
            .fold(self.stake, |acc, d| acc.checked_add(*d).unwrap_or(acc))
    }

    pub fn is_active(&self) -> bool {
        self.status == ValidatorStatus::Active
    }

    pub fn is_eligible_for_selection(&self, _current_height: u64) -> bool {
        self.is_active() && self.stake.units() >= Amount::from_integer(MIN_STAKE).units()
    }

    pub fn participation_days(&self, now: u64) -> f64 {
        now.saturating_sub(self.joined_at) as f64 / 86_400.0
    }
}

/// An in-flight request to withdraw stake, queued for the unbonding period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnstakeStatus {
    Queued,
    Ready,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnstakeRequest {
    pub validator: Address,
    pub amount: Amount,
    pub requested_at_height: u64,
    /// Height at which the unbonding period elapses and funds become claimable.
    pub matures_at_height: u64,
    /// 1-indexed position among still-`Queued` requests, recomputed every
    /// time the exit queue gains or loses an entry ahead of this one.
    pub queue_position: usize,
    pub status: UnstakeStatus,
}

impl UnstakeRequest {
    pub fn is_mature(&self, current_height: u64) -> bool {
        current_height >= self.matures_at_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn validator() -> Validator {
        Validator {
            address: Address::parse("bt2c_aaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap(),
            public_key: vec![1, 2, 3],
            stake: Amount::from_str("10").unwrap(),
            status: ValidatorStatus::Active,
            commission_rate: 0.1,
            joined_at: 0,
            metrics: ReputationMetrics::default(),
            consecutive_selections: 0,
            blocks_produced: 0,
            blocks_missed: 0,
            last_block_time: 0,
            jailed_at: None,
            slash_points: 0,
            rewards_earned: Amount::ZERO,
            delegations: Default::default(),
        }
    }

    #[test]
    fn total_stake_includes_delegations() {
        let mut v = validator();
        v.delegations.insert(
            Address::parse("bt2c_bbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap(),
            Amount::from_str("5").unwrap(),
        );
        assert_eq!(v.total_stake().to_string(), "15.00000000");
    }

    #[test]
    fn jailed_validator_is_ineligible() {
        let mut v = validator();
        v.status = ValidatorStatus::Jailed;
        v.jailed_at = Some(100);
        assert!(!v.is_eligible_for_selection(100));
        v.status = ValidatorStatus::Active;
        v.jailed_at = None;
        assert!(v.is_eligible_for_selection(100));
    }

    #[test]
    fn below_min_stake_ineligible() {
        let mut v = validator();
        v.stake = Amount::from_str("0.5").unwrap();
        assert!(!v.is_eligible_for_selection(0));
    }
}
