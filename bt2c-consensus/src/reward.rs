use std::collections::BTreeMap;

use bt2c_config::ChainConfig;
use bt2c_core::{Address, Amount};

/// Halving stops once the subsidy would otherwise be halved this many times.
const MAX_HALVINGS: u64 = 64;

/// Computes block subsidies and the commission split between a validator
/// and its delegators. The one-time developer/distribution registration
/// bonuses live in [`crate::validator_set::ValidatorSet::register`] instead
/// — they're credited once, at registration, not per block.
pub struct RewardEngine<'a> {
    config: &'a ChainConfig,
}

impl<'a> RewardEngine<'a> {
    pub fn new(config: &'a ChainConfig) -> Self {
        Self { config }
    }

    /// The block subsidy at `height`, halving every
    /// `halving_interval_blocks` blocks until it bottoms out at zero.
    pub fn block_subsidy(&self, height: u64) -> Amount {
        let halvings = height / self.config.halving_interval_blocks;
        if halvings >= MAX_HALVINGS {
            return Amount::ZERO;
        }
        Amount::from_units(self.config.initial_block_reward.units() >> halvings)
    }

    pub fn total_block_reward(&self, height: u64, fees: Amount) -> Amount {
        self.block_subsidy(height).checked_add(fees).unwrap_or(fees)
    }

    /// Splits `total_reward` between the proposing validator and its
    /// delegators: the validator takes `commission_rate` off the top, then
    /// the remainder is distributed pro-rata to self-stake and delegated
    /// stake by their share of the validator's total stake.
    pub fn split_commission(
        total_reward: Amount,
        commission_rate: f64,
        validator_self_stake: Amount,
        delegations: &BTreeMap<Address, Amount>,
    ) -> (Amount, BTreeMap<Address, Amount>) {
        let commission = total_reward.checked_mul_f64(commission_rate.clamp(0.0, 1.0));
        let remaining = total_reward.checked_sub(commission).unwrap_or(Amount::ZERO);

        let total_stake = delegations
            .values()
            .fold(validator_self_stake, |acc, d| acc.checked_add(*d).unwrap_or(acc));
        if total_stake.is_zero() {
            return (total_reward, BTreeMap::new());
        }
        let total_stake_f = total_stake.to_f64();

        let mut payouts = BTreeMap::new();
        for (address, stake) in delegations {
            let share = stake.to_f64() / total_stake_f;
            payouts.insert(address.clone(), remaining.checked_mul_f64(share));
        }
        let self_share = validator_self_stake.to_f64() / total_stake_f;
        let validator_payout = remaining
            .checked_mul_f64(self_share)
            .checked_add(commission)
            .unwrap_or(commission);

        (validator_payout, payouts)
    }
}
