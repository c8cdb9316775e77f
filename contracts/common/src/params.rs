//! Per-domain risk parameters
//!
//! Every collateral domain carries its own parameter set so that assets with
//! different volatility can be listed side by side. Defaults come from
//! [`crate::constants`]; `validate` enforces the safety bounds.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::{fees, gas_pool, limits, liquidation, ratios, safety};
use crate::errors::{XusdError, XusdResult};

/// Risk configuration of one collateral domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RiskParams {
    /// Minimum Collateral Ratio (1e18 = 100%)
    pub mcr: u128,
    /// Critical Collateral Ratio (1e18 = 100%)
    pub ccr: u128,
    /// Stablecoin reserve held per position for the liquidator
    pub gas_compensation: u64,
    /// Minimum debt excluding the reserve
    pub min_net_debt: u64,
    /// Liquidator collateral share is `coll / percent_divisor`
    pub percent_divisor: u64,
    /// Borrowing fee floor (1e18 = 100%)
    pub borrowing_fee_floor: u128,
    /// Borrowing fee cap (1e18 = 100%)
    pub max_borrowing_fee: u128,
    /// Redemption fee floor (1e18 = 100%)
    pub redemption_fee_floor: u128,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            mcr: ratios::MCR,
            ccr: ratios::CCR,
            gas_compensation: gas_pool::GAS_COMPENSATION,
            min_net_debt: limits::MIN_NET_DEBT,
            percent_divisor: liquidation::PERCENT_DIVISOR,
            borrowing_fee_floor: fees::BORROWING_FEE_FLOOR,
            max_borrowing_fee: fees::MAX_BORROWING_FEE,
            redemption_fee_floor: fees::REDEMPTION_FEE_FLOOR,
        }
    }
}

impl RiskParams {
    /// Check every field against its safety bounds
    pub fn validate(&self) -> XusdResult<()> {
        if !(safety::RATIO_MIN..=safety::RATIO_MAX).contains(&self.mcr) {
            return Err(invalid("mcr", "outside 101%..1000%"));
        }
        if !(safety::RATIO_MIN..=safety::RATIO_MAX).contains(&self.ccr) {
            return Err(invalid("ccr", "outside 101%..1000%"));
        }
        if self.ccr < self.mcr {
            return Err(invalid("ccr", "below mcr"));
        }
        if !(safety::GAS_COMPENSATION_MIN..=safety::GAS_COMPENSATION_MAX).contains(&self.gas_compensation) {
            return Err(invalid("gas_compensation", "outside safety range"));
        }
        if self.min_net_debt > safety::MIN_NET_DEBT_MAX {
            return Err(invalid("min_net_debt", "above safety maximum"));
        }
        if !(safety::PERCENT_DIVISOR_MIN..=safety::PERCENT_DIVISOR_MAX).contains(&self.percent_divisor) {
            return Err(invalid("percent_divisor", "outside 2..200"));
        }
        if self.borrowing_fee_floor > safety::BORROWING_FEE_MAX {
            return Err(invalid("borrowing_fee_floor", "above 10%"));
        }
        if self.max_borrowing_fee > safety::BORROWING_FEE_MAX {
            return Err(invalid("max_borrowing_fee", "above 10%"));
        }
        if !(safety::REDEMPTION_FEE_FLOOR_MIN..=safety::REDEMPTION_FEE_FLOOR_MAX)
            .contains(&self.redemption_fee_floor)
        {
            return Err(invalid("redemption_fee_floor", "outside 0.1%..10%"));
        }
        Ok(())
    }

    /// Debt excluding the gas compensation reserve
    pub fn net_debt(&self, debt: u64) -> u64 {
        debt.saturating_sub(self.gas_compensation)
    }

    /// Debt including the gas compensation reserve
    pub fn composite_debt(&self, net_debt: u64) -> XusdResult<u64> {
        net_debt
            .checked_add(self.gas_compensation)
            .ok_or(XusdError::Overflow)
    }

    /// Liquidator's share of a collateral amount
    pub fn coll_gas_compensation(&self, coll: u64) -> u64 {
        coll / self.percent_divisor
    }
}

fn invalid(param: &'static str, reason: &'static str) -> XusdError {
    XusdError::InvalidParameter { param, reason }
}
