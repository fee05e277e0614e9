use thiserror::Error;

use bt2c_core::Address;

#[derive(Debug, Error, PartialEq)]
pub enum ConsensusError {
    #[error("validator {0} is already registered")]
    AlreadyRegistered(Address),

    #[error("validator {0} is not registered")]
    NotFound(Address),

    #[error("stake {got} below minimum required stake {min}")]
    BelowMinimumStake { min: String, got: String },

    #[error("validator {0} has insufficient stake to unstake that amount")]
    InsufficientStake(Address),

    #[error("no active validators are eligible for selection")]
    NoEligibleValidators,

    #[error("validator {0} is jailed and cannot be selected")]
    Jailed(Address),

    #[error("validator {0} is tombstoned and cannot be modified")]
    Tombstoned(Address),

    #[error("partial unstake of {requested} would leave {remaining}, below minimum stake {min}; unstake the full amount instead")]
    PartialUnstakeBelowMinimum {
        requested: String,
        remaining: String,
        min: String,
    },

    #[error("validator {0} is not jailed")]
    NotJailed(Address),

    #[error("unjail wait period has not elapsed for validator {0}")]
    UnjailWaitPeriodNotElapsed(Address),
}
