// src/stake.rs
//! Stake arithmetic
//!
//! Pure functions that turn an advertised relayer capacity or a validator
//! slot index into the collateral that must be locked for it. Integer math
//! only, every step checked, so independent nodes always agree on the result.

use crate::error::{checked_add, checked_mul, Result};
use crate::types::{Value, COIN_UNIT};
use serde::{Deserialize, Serialize};

/// Basis-point denominator (100% = 10_000 bps)
pub const BPS_DENOMINATOR: Value = 10_000;

/// Capacity a relayer advertises at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerCapacity {
    /// Maximum number of live channels
    pub max_users: u64,
    /// Maximum total deposits, in whole coins
    pub max_coins: u64,
    /// Advertised off-chain transactions per second
    pub max_tx_throughput: u64,
}

impl RelayerCapacity {
    pub fn new(max_users: u64, max_coins: u64, max_tx_throughput: u64) -> Self {
        Self {
            max_users,
            max_coins,
            max_tx_throughput,
        }
    }

    /// Deposit cap in base units
    pub fn deposit_cap(&self) -> Result<Value> {
        checked_mul(self.max_coins as Value, COIN_UNIT, "relayer deposit cap")
    }
}

/// Collateral schedule for relayers and validator candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSchedule {
    /// Flat stake every relayer locks
    pub relayer_base_stake: Value,
    /// Stake per advertised channel slot
    pub stake_per_user: Value,
    /// Share of the deposit cap that must be self-collateralized
    pub collateral_ratio_bps: Value,
    /// Stake per advertised tx/s
    pub stake_per_tx_throughput: Value,
    /// Stake for validator slot 0
    pub validator_base_stake: Value,
    /// Growth step; slot `n` costs `base + step * n(n+1)/2`
    pub validator_slot_step: Value,
}

impl Default for StakeSchedule {
    fn default() -> Self {
        Self {
            relayer_base_stake: COIN_UNIT / 10,             // 0.1 coin
            stake_per_user: COIN_UNIT / 1_000,              // 0.001 coin per slot
            collateral_ratio_bps: 10,                       // 0.1% of deposit cap
            stake_per_tx_throughput: COIN_UNIT / 100,       // 0.01 coin per tx/s
            validator_base_stake: 100 * COIN_UNIT,          // 100 coins
            validator_slot_step: 5 * COIN_UNIT,             // +5, +10, +15, ...
        }
    }
}

impl StakeSchedule {
    /// Collateral a relayer must lock to advertise `capacity`.
    ///
    /// Non-decreasing in every capacity component.
    pub fn required_relayer_stake(&self, capacity: &RelayerCapacity) -> Result<Value> {
        let users = checked_mul(
            capacity.max_users as Value,
            self.stake_per_user,
            "relayer user stake",
        )?;

        let cap = capacity.deposit_cap()?;
        let collateral = checked_mul(cap, self.collateral_ratio_bps, "relayer collateral")?
            / BPS_DENOMINATOR;

        let throughput = checked_mul(
            capacity.max_tx_throughput as Value,
            self.stake_per_tx_throughput,
            "relayer throughput stake",
        )?;

        let total = checked_add(self.relayer_base_stake, users, "relayer stake")?;
        let total = checked_add(total, collateral, "relayer stake")?;
        checked_add(total, throughput, "relayer stake")
    }

    /// Stake required for the validator candidate entering at `slot`.
    ///
    /// Strictly increasing in `slot` whenever `validator_slot_step > 0`.
    pub fn required_validator_stake(&self, slot: u64) -> Result<Value> {
        let slot = slot as Value;
        let next = checked_add(slot, 1, "validator slot")?;
        // n(n+1) is always even, so the halving is exact
        let triangular = checked_mul(slot, next, "validator slot growth")? / 2;
        let growth = checked_mul(triangular, self.validator_slot_step, "validator slot growth")?;
        checked_add(self.validator_base_stake, growth, "validator stake")
    }

    /// Reject schedules that would break the monotonicity guarantees
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.validator_slot_step == 0 {
            return Err("validator_slot_step must be greater than zero".into());
        }
        if self.collateral_ratio_bps > BPS_DENOMINATOR {
            return Err(format!(
                "collateral_ratio_bps {} exceeds {}",
                self.collateral_ratio_bps, BPS_DENOMINATOR
            ));
        }
        Ok(())
    }
}

/// Convenience wrapper using the default schedule
pub fn required_relayer_stake(
    max_users: u64,
    max_coins: u64,
    max_tx_throughput: u64,
) -> Result<Value> {
    StakeSchedule::default()
        .required_relayer_stake(&RelayerCapacity::new(max_users, max_coins, max_tx_throughput))
}

/// Convenience wrapper using the default schedule
pub fn required_validator_stake(slot: u64) -> Result<Value> {
    StakeSchedule::default().required_validator_stake(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use proptest::prelude::*;

    #[test]
    fn test_default_relayer_stake() {
        // 0.1 + 150 * 0.001 + 0.1% of 10_000 coins + 10 * 0.01
        let required = required_relayer_stake(150, 10_000, 10).unwrap();
        let expected = COIN_UNIT / 10 + 150 * (COIN_UNIT / 1_000) + 10 * COIN_UNIT + COIN_UNIT / 10;
        assert_eq!(required, expected);
    }

    #[test]
    fn test_zero_capacity_costs_base_stake() {
        let schedule = StakeSchedule::default();
        assert_eq!(
            schedule
                .required_relayer_stake(&RelayerCapacity::new(0, 0, 0))
                .unwrap(),
            schedule.relayer_base_stake
        );
    }

    #[test]
    fn test_relayer_stake_overflow_is_reported() {
        let schedule = StakeSchedule {
            stake_per_user: Value::MAX,
            ..StakeSchedule::default()
        };
        let err = schedule
            .required_relayer_stake(&RelayerCapacity::new(2, 0, 0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::ArithmeticOverflow(_)));
    }

    #[test]
    fn test_validator_stake_schedule() {
        let schedule = StakeSchedule::default();
        assert_eq!(schedule.required_validator_stake(0).unwrap(), 100 * COIN_UNIT);
        assert_eq!(schedule.required_validator_stake(1).unwrap(), 105 * COIN_UNIT);
        assert_eq!(schedule.required_validator_stake(2).unwrap(), 115 * COIN_UNIT);
        assert_eq!(schedule.required_validator_stake(3).unwrap(), 130 * COIN_UNIT);
    }

    #[test]
    fn test_validator_stake_overflow_is_reported() {
        let err = StakeSchedule::default()
            .required_validator_stake(u64::MAX)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ArithmeticOverflow(_)));
    }

    #[test]
    fn test_schedule_validation() {
        assert!(StakeSchedule::default().validate().is_ok());
        let flat = StakeSchedule {
            validator_slot_step: 0,
            ..StakeSchedule::default()
        };
        assert!(flat.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_relayer_stake_is_monotonic(
            u1 in 0u64..1_000_000, du in 0u64..1_000_000,
            c1 in 0u64..1_000_000_000, dc in 0u64..1_000_000_000,
            t1 in 0u64..1_000_000, dt in 0u64..1_000_000,
        ) {
            let schedule = StakeSchedule::default();
            let low = schedule
                .required_relayer_stake(&RelayerCapacity::new(u1, c1, t1))
                .unwrap();
            let high = schedule
                .required_relayer_stake(&RelayerCapacity::new(u1 + du, c1 + dc, t1 + dt))
                .unwrap();
            prop_assert!(low <= high);
        }

        #[test]
        fn prop_validator_stake_strictly_increasing(slot in 0u64..10_000_000) {
            let schedule = StakeSchedule::default();
            let here = schedule.required_validator_stake(slot).unwrap();
            let next = schedule.required_validator_stake(slot + 1).unwrap();
            prop_assert!(here < next);
        }
    }
}
