//! Stability Pool
//!
//! First line of defense for an xUSD domain. Depositors pool stablecoin
//! that is burned against liquidated debt; in exchange they receive the
//! liquidated collateral pro-rata.
//!
//! Per-depositor accounting is O(1) with a running product `P` (how much of
//! an initial deposit survives) and sums `S` keyed by epoch and scale (how
//! much collateral a unit of deposit has earned). `P` is rescaled by
//! `SCALE_FACTOR` whenever it would lose precision, and a new epoch starts
//! whenever an offset empties the pool.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use xusd_common::{
    constants::{
        precision::DECIMAL_PRECISION,
        stability_pool::{DUST_DIVISOR, SCALE_FACTOR},
    },
    errors::{XusdError, XusdResult},
    events::{EventLog, XusdEvent},
    math::{mul_div, to_u64},
    traits::LiquidityBuffer,
    types::Address,
};

// ============ Deposit Types ============

/// Pool accumulators captured when a deposit last changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct DepositSnapshot {
    pub p: u128,
    pub s: u128,
    pub epoch: u64,
    pub scale: u64,
}

/// A depositor's position in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Deposit {
    /// Deposit value at the last snapshot
    pub initial_value: u64,
    pub snapshot: DepositSnapshot,
}

/// Result of a deposit or withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepositChange {
    /// Stablecoin returned to the depositor
    pub withdrawn: u64,
    /// Collateral gain paid out
    pub collateral_gain: u64,
    /// Deposit value after the change
    pub new_deposit: u64,
}

// ============ Stability Pool State ============

/// Stability pool of one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StabilityPool {
    /// Ledger account holding the pooled stablecoin
    account: Address,
    /// Stablecoin deposits not yet consumed by offsets
    total_deposits: u64,
    /// Collateral received from liquidations and not yet paid out
    collateral: u64,
    /// Running product
    p: u128,
    current_scale: u64,
    current_epoch: u64,
    epoch_to_scale_to_sum: BTreeMap<(u64, u64), u128>,
    last_coll_error_offset: u128,
    last_debt_loss_error_offset: u128,
    deposits: BTreeMap<Address, Deposit>,
    #[serde(skip)]
    #[borsh(skip)]
    events: EventLog,
}

impl StabilityPool {
    /// Create an empty pool whose stablecoin sits in `account`
    pub fn new(account: Address) -> Self {
        Self {
            account,
            total_deposits: 0,
            collateral: 0,
            p: DECIMAL_PRECISION,
            current_scale: 0,
            current_epoch: 0,
            epoch_to_scale_to_sum: BTreeMap::new(),
            last_coll_error_offset: 0,
            last_debt_loss_error_offset: 0,
            deposits: BTreeMap::new(),
            events: EventLog::new(),
        }
    }

    pub fn collateral(&self) -> u64 {
        self.collateral
    }

    pub fn product(&self) -> u128 {
        self.p
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    pub fn current_scale(&self) -> u64 {
        self.current_scale
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn deposit_of(&self, depositor: &Address) -> Option<&Deposit> {
        self.deposits.get(depositor)
    }

    fn sum_at(&self, epoch: u64, scale: u64) -> u128 {
        self.epoch_to_scale_to_sum.get(&(epoch, scale)).copied().unwrap_or(0)
    }

    // ============ Depositor Operations ============

    /// Add `amount` to the depositor's compounded deposit, paying out pending collateral gain
    ///
    /// The caller moves `amount` stablecoin into [`LiquidityBuffer::deposit_account`].
    pub fn provide_to_sp(&mut self, depositor: &Address, amount: u64) -> XusdResult<DepositChange> {
        // 1. Amount must be positive
        if amount == 0 {
            return Err(XusdError::ZeroAmount);
        }

        // 2. Settle the existing deposit
        let collateral_gain = self.get_depositor_collateral_gain(depositor)?;
        let compounded = self.get_compounded_deposit(depositor)?;
        let initial = self.deposits.get(depositor).map(|d| d.initial_value).unwrap_or(0);

        // 3. Compound and snapshot
        let new_deposit = compounded.checked_add(amount).ok_or(XusdError::Overflow)?;
        self.update_deposit_and_snapshots(depositor, new_deposit);
        self.total_deposits = self.total_deposits.checked_add(amount).ok_or(XusdError::Overflow)?;
        self.pay_out_gain(depositor, collateral_gain, initial.saturating_sub(compounded))?;

        self.events.emit(XusdEvent::StabilityDeposit {
            depositor: *depositor,
            amount,
            new_deposit,
            pool_total: self.total_deposits,
        });

        Ok(DepositChange { withdrawn: 0, collateral_gain, new_deposit })
    }

    /// Withdraw up to `amount` of the compounded deposit, paying out pending collateral gain
    ///
    /// A zero `amount` only claims the gain.
    pub fn withdraw_from_sp(&mut self, depositor: &Address, amount: u64) -> XusdResult<DepositChange> {
        // 1. Depositor must exist
        let initial = self
            .deposits
            .get(depositor)
            .map(|d| d.initial_value)
            .ok_or(XusdError::DepositNotFound { user: *depositor })?;

        // 2. Settle
        let collateral_gain = self.get_depositor_collateral_gain(depositor)?;
        let compounded = self.get_compounded_deposit(depositor)?;
        let withdrawn = amount.min(compounded);
        let new_deposit = compounded - withdrawn;

        // 3. Update
        self.update_deposit_and_snapshots(depositor, new_deposit);
        self.total_deposits = self
            .total_deposits
            .checked_sub(withdrawn)
            .ok_or(XusdError::InsufficientPoolBalance {
                available: self.total_deposits,
                required: withdrawn,
            })?;
        self.pay_out_gain(depositor, collateral_gain, initial.saturating_sub(compounded))?;

        self.events.emit(XusdEvent::StabilityWithdrawal {
            depositor: *depositor,
            amount: withdrawn,
            remaining_deposit: new_deposit,
            pool_total: self.total_deposits,
        });

        Ok(DepositChange { withdrawn, collateral_gain, new_deposit })
    }

    fn pay_out_gain(&mut self, depositor: &Address, gain: u64, debt_loss: u64) -> XusdResult<()> {
        if gain == 0 {
            return Ok(());
        }
        self.collateral = self.collateral.checked_sub(gain).ok_or(XusdError::InsufficientPoolBalance {
            available: self.collateral,
            required: gain,
        })?;
        self.events.emit(XusdEvent::CollateralGainWithdrawn {
            depositor: *depositor,
            collateral: gain,
            debt_loss,
        });
        Ok(())
    }

    fn update_deposit_and_snapshots(&mut self, depositor: &Address, new_value: u64) {
        if new_value == 0 {
            self.deposits.remove(depositor);
            return;
        }
        let snapshot = DepositSnapshot {
            p: self.p,
            s: self.sum_at(self.current_epoch, self.current_scale),
            epoch: self.current_epoch,
            scale: self.current_scale,
        };
        self.deposits.insert(*depositor, Deposit { initial_value: new_value, snapshot });
    }

    // ============ Depositor Views ============

    /// Deposit value after all offsets since the last snapshot
    pub fn get_compounded_deposit(&self, depositor: &Address) -> XusdResult<u64> {
        let Some(deposit) = self.deposits.get(depositor) else {
            return Ok(0);
        };
        let snapshot = deposit.snapshot;

        // Emptied by an offset in an earlier epoch
        if snapshot.epoch < self.current_epoch {
            return Ok(0);
        }

        let scale_diff = self.current_scale - snapshot.scale;
        let compounded = match scale_diff {
            0 => mul_div(deposit.initial_value as u128, self.p, snapshot.p)?,
            1 => mul_div(deposit.initial_value as u128, self.p, snapshot.p)? / SCALE_FACTOR,
            _ => 0,
        };
        let compounded = to_u64(compounded)?;

        if compounded < deposit.initial_value / DUST_DIVISOR {
            return Ok(0);
        }
        Ok(compounded)
    }

    /// Collateral earned since the last snapshot
    pub fn get_depositor_collateral_gain(&self, depositor: &Address) -> XusdResult<u64> {
        let Some(deposit) = self.deposits.get(depositor) else {
            return Ok(0);
        };
        let snapshot = deposit.snapshot;

        // Gains spill into at most one later scale
        let first_portion = self.sum_at(snapshot.epoch, snapshot.scale) - snapshot.s;
        let second_portion = self.sum_at(snapshot.epoch, snapshot.scale + 1) / SCALE_FACTOR;

        let per_unit = (first_portion + second_portion) / snapshot.p;
        let gain = mul_div(deposit.initial_value as u128, per_unit, DECIMAL_PRECISION)?;
        to_u64(gain)
    }

    // ============ Offset ============

    fn compute_rewards_per_unit_staked(&mut self, coll: u64, debt: u64) -> XusdResult<(u128, u128)> {
        let total = self.total_deposits as u128;

        let coll_numerator = (coll as u128)
            .checked_mul(DECIMAL_PRECISION)
            .and_then(|v| v.checked_add(self.last_coll_error_offset))
            .ok_or(XusdError::Overflow)?;

        let debt_loss_per_unit = if debt as u128 == total {
            // Emptying the pool
            self.last_debt_loss_error_offset = 0;
            DECIMAL_PRECISION
        } else {
            let loss_numerator = (debt as u128 * DECIMAL_PRECISION)
                .saturating_sub(self.last_debt_loss_error_offset);
            // Round the loss up so deposits are never overstated
            let per_unit = loss_numerator / total + 1;
            self.last_debt_loss_error_offset = per_unit * total - loss_numerator;
            per_unit
        };

        let coll_gain_per_unit = coll_numerator / total;
        self.last_coll_error_offset = coll_numerator - coll_gain_per_unit * total;

        Ok((coll_gain_per_unit, debt_loss_per_unit))
    }

    fn update_reward_sum_and_product(&mut self, coll_gain_per_unit: u128, debt_loss_per_unit: u128) -> XusdResult<()> {
        let current_p = self.p;
        let new_product_factor = DECIMAL_PRECISION
            .checked_sub(debt_loss_per_unit)
            .ok_or(XusdError::Underflow)?;

        let marginal_gain = coll_gain_per_unit.checked_mul(current_p).ok_or(XusdError::Overflow)?;
        let key = (self.current_epoch, self.current_scale);
        let new_sum = self.sum_at(key.0, key.1).checked_add(marginal_gain).ok_or(XusdError::Overflow)?;
        self.epoch_to_scale_to_sum.insert(key, new_sum);

        let new_p = if new_product_factor == 0 {
            self.current_epoch += 1;
            self.current_scale = 0;
            DECIMAL_PRECISION
        } else if current_p * new_product_factor / DECIMAL_PRECISION < SCALE_FACTOR {
            self.current_scale += 1;
            current_p * new_product_factor * SCALE_FACTOR / DECIMAL_PRECISION
        } else {
            current_p * new_product_factor / DECIMAL_PRECISION
        };

        if new_p == 0 {
            return Err(XusdError::Underflow);
        }
        self.p = new_p;
        Ok(())
    }
}

impl LiquidityBuffer for StabilityPool {
    fn total_deposits(&self) -> u64 {
        self.total_deposits
    }

    fn deposit_account(&self) -> Address {
        self.account
    }

    fn offset(&mut self, debt: u64, coll: u64) -> XusdResult<()> {
        if self.total_deposits == 0 || debt == 0 {
            return Ok(());
        }
        if debt > self.total_deposits {
            return Err(XusdError::InsufficientPoolBalance {
                available: self.total_deposits,
                required: debt,
            });
        }

        let (coll_gain_per_unit, debt_loss_per_unit) = self.compute_rewards_per_unit_staked(coll, debt)?;
        self.update_reward_sum_and_product(coll_gain_per_unit, debt_loss_per_unit)?;

        self.total_deposits -= debt;
        self.collateral = self.collateral.checked_add(coll).ok_or(XusdError::Overflow)?;

        tracing::debug!(debt, coll, p = %self.p, epoch = self.current_epoch, scale = self.current_scale, "stability pool offset");
        self.events.emit(XusdEvent::LiquidationOffset {
            debt_offset: debt,
            collateral_added: coll,
            new_product: self.p,
            epoch: self.current_epoch,
            scale: self.current_scale,
        });
        Ok(())
    }
}

// ============ Tests ============
