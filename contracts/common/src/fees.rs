//! Base rate fee model
//!
//! The base rate rises with redemption volume and decays exponentially with
//! the time since the last fee operation (12 hour half-life). Redemption and
//! borrowing rates are both derived from it.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::{fees, precision::DECIMAL_PRECISION, time};
use crate::errors::XusdResult;
use crate::math::{dec_mul, dec_pow, mul_div, to_u64};
use crate::params::RiskParams;

/// Decaying fee state of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BaseRate {
    /// Current base rate (1e18 = 100%), as of `last_fee_operation_time`
    pub base_rate: u128,
    /// Timestamp (seconds) of the last fee-bearing operation
    pub last_fee_operation_time: u64,
}

impl BaseRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole minutes elapsed since the last fee operation
    pub fn minutes_passed(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_fee_operation_time) / time::SECONDS_IN_ONE_MINUTE
    }

    /// Base rate decayed to `now`
    pub fn decayed(&self, now: u64) -> XusdResult<u128> {
        let factor = dec_pow(fees::MINUTE_DECAY_FACTOR, self.minutes_passed(now))?;
        dec_mul(self.base_rate, factor)
    }

    /// Decay, then add the redeemed fraction divided by `BETA`, capped at 100%
    ///
    /// `redeemed_fraction` is `coll_drawn * price / total_debt` as a 1e18 value.
    pub fn update_from_redemption(&mut self, redeemed_fraction: u128, now: u64) -> XusdResult<u128> {
        let decayed = self.decayed(now)?;
        let new_rate = decayed
            .saturating_add(redeemed_fraction / fees::BETA)
            .min(DECIMAL_PRECISION);
        self.base_rate = new_rate;
        self.touch(now);
        Ok(new_rate)
    }

    /// Decay the base rate on a borrowing operation
    pub fn decay_from_borrowing(&mut self, now: u64) -> XusdResult<u128> {
        let decayed = self.decayed(now)?;
        self.base_rate = decayed.min(DECIMAL_PRECISION);
        self.touch(now);
        Ok(self.base_rate)
    }

    /// Advance the fee operation time, only in whole minutes
    fn touch(&mut self, now: u64) {
        if now.saturating_sub(self.last_fee_operation_time) >= time::SECONDS_IN_ONE_MINUTE {
            self.last_fee_operation_time = now;
        }
    }

    // ============ Rates ============

    pub fn redemption_rate(&self, params: &RiskParams) -> u128 {
        calc_redemption_rate(params, self.base_rate)
    }

    pub fn redemption_rate_with_decay(&self, params: &RiskParams, now: u64) -> XusdResult<u128> {
        Ok(calc_redemption_rate(params, self.decayed(now)?))
    }

    pub fn redemption_fee_with_decay(&self, params: &RiskParams, coll_drawn: u64, now: u64) -> XusdResult<u64> {
        fee_for(self.redemption_rate_with_decay(params, now)?, coll_drawn)
    }

    pub fn borrowing_rate(&self, params: &RiskParams) -> u128 {
        calc_borrowing_rate(params, self.base_rate)
    }

    pub fn borrowing_rate_with_decay(&self, params: &RiskParams, now: u64) -> XusdResult<u128> {
        Ok(calc_borrowing_rate(params, self.decayed(now)?))
    }

    pub fn borrowing_fee(&self, params: &RiskParams, debt: u64) -> XusdResult<u64> {
        fee_for(self.borrowing_rate(params), debt)
    }
}

/// `min(floor + base_rate, 100%)`
pub fn calc_redemption_rate(params: &RiskParams, base_rate: u128) -> u128 {
    params
        .redemption_fee_floor
        .saturating_add(base_rate)
        .min(DECIMAL_PRECISION)
}

/// `min(floor + base_rate, max_borrowing_fee)`
pub fn calc_borrowing_rate(params: &RiskParams, base_rate: u128) -> u128 {
    params
        .borrowing_fee_floor
        .saturating_add(base_rate)
        .min(params.max_borrowing_fee)
}

/// Apply a 1e18 rate to an amount
pub fn fee_for(rate: u128, amount: u64) -> XusdResult<u64> {
    to_u64(mul_div(rate, amount as u128, DECIMAL_PRECISION)?)
}
