//! Redistribution accumulators
//!
//! `l_coll` and `l_debt` count collateral and debt redistributed per unit of
//! stake since the domain was created. A position's pending reward is the
//! accumulator growth since its snapshot times its stake, so recording a
//! redistribution is O(1) no matter how many positions are open.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use xusd_common::{
    constants::precision::DECIMAL_PRECISION,
    errors::{XusdError, XusdResult},
    math::{mul_div, to_u64},
    types::{Position, RewardSnapshot},
};

/// Accumulators, their rounding remainders and the stake totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RewardState {
    /// Collateral redistributed per unit of stake (1e18 scaled)
    pub l_coll: u128,
    /// Debt redistributed per unit of stake (1e18 scaled)
    pub l_debt: u128,
    /// Remainders carried into the next redistribution
    pub last_coll_error: u128,
    pub last_debt_error: u128,
    /// Sum of all active stakes
    pub total_stakes: u64,
    /// `total_stakes` right after the last liquidation
    pub total_stakes_snapshot: u64,
    /// System collateral right after the last liquidation
    pub total_coll_snapshot: u64,
}

impl RewardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current accumulator values
    pub fn snapshot(&self) -> RewardSnapshot {
        RewardSnapshot {
            l_coll: self.l_coll,
            l_debt: self.l_debt,
        }
    }

    /// Collateral owed to `position` since its snapshot
    pub fn pending_coll(&self, position: &Position) -> XusdResult<u64> {
        pending_reward(self.l_coll, position.snapshot.l_coll, position)
    }

    /// Debt owed by `position` since its snapshot
    pub fn pending_debt(&self, position: &Position) -> XusdResult<u64> {
        pending_reward(self.l_debt, position.snapshot.l_debt, position)
    }

    pub fn has_pending(&self, position: &Position) -> bool {
        position.status.is_active()
            && (position.snapshot.l_coll < self.l_coll || position.snapshot.l_debt < self.l_debt)
    }

    /// Stake for `coll`, rebased on the snapshots of the last liquidation
    ///
    /// Before the first liquidation the stake equals the collateral.
    pub fn compute_stake(&self, coll: u64) -> XusdResult<u64> {
        if self.total_coll_snapshot == 0 {
            return Ok(coll);
        }
        let stake = mul_div(
            coll as u128,
            self.total_stakes_snapshot as u128,
            self.total_coll_snapshot as u128,
        )?;
        to_u64(stake)
    }

    pub fn add_stake(&mut self, stake: u64) -> XusdResult<()> {
        self.total_stakes = self.total_stakes.checked_add(stake).ok_or(XusdError::Overflow)?;
        Ok(())
    }

    pub fn remove_stake(&mut self, stake: u64) -> XusdResult<()> {
        self.total_stakes = self.total_stakes.checked_sub(stake).ok_or(XusdError::Underflow)?;
        Ok(())
    }

    /// Spread `coll` and `debt` over the active stakes
    ///
    /// Returns the per-stake increments. The division remainder is carried
    /// into the next call so nothing is lost to rounding over time.
    pub fn redistribute(&mut self, coll: u64, debt: u64) -> XusdResult<(u128, u128)> {
        if debt == 0 {
            return Ok((0, 0));
        }
        if self.total_stakes == 0 {
            return Err(XusdError::DivisionByZero);
        }
        let total = self.total_stakes as u128;

        let coll_numerator = scaled_with_error(coll, self.last_coll_error)?;
        let debt_numerator = scaled_with_error(debt, self.last_debt_error)?;

        let coll_per_stake = coll_numerator / total;
        let debt_per_stake = debt_numerator / total;

        self.last_coll_error = coll_numerator - coll_per_stake * total;
        self.last_debt_error = debt_numerator - debt_per_stake * total;

        self.l_coll = self.l_coll.checked_add(coll_per_stake).ok_or(XusdError::Overflow)?;
        self.l_debt = self.l_debt.checked_add(debt_per_stake).ok_or(XusdError::Overflow)?;

        Ok((coll_per_stake, debt_per_stake))
    }

    /// Capture the stake and collateral totals after a liquidation
    pub fn update_system_snapshots(&mut self, total_coll: u64) {
        self.total_stakes_snapshot = self.total_stakes;
        self.total_coll_snapshot = total_coll;
    }
}

fn scaled_with_error(amount: u64, error: u128) -> XusdResult<u128> {
    (amount as u128)
        .checked_mul(DECIMAL_PRECISION)
        .and_then(|v| v.checked_add(error))
        .ok_or(XusdError::Overflow)
}

fn pending_reward(l_now: u128, l_snapshot: u128, position: &Position) -> XusdResult<u64> {
    if !position.status.is_active() {
        return Ok(0);
    }
    let delta = l_now.saturating_sub(l_snapshot);
    if delta == 0 {
        return Ok(0);
    }
    to_u64(mul_div(position.stake as u128, delta, DECIMAL_PRECISION)?)
}
