//! Liquidation Engine
//!
//! ```text
//! candidate (ICR re-derived at the call's price)
//!        │
//!        ├── normal mode, ICR < MCR ─────────► offset min(debt, buffer), redistribute rest
//!        │
//!        └── recovery mode
//!              ├── ICR <= 100% ──────────────► redistribute everything
//!              ├── 100% < ICR < MCR ─────────► same split as normal mode
//!              ├── MCR <= ICR <= TCR,
//!              │   debt <= buffer ───────────► capped offset, surplus to owner
//!              └── otherwise ────────────────► skip
//! ```
//!
//! Every liquidated position is settled immediately (offset, redistribution,
//! surplus, snapshots) so the next candidate sees exactly the state a single
//! call would have left. The liquidator is paid once per call: the gas
//! compensation reserve of every liquidated position plus
//! `coll / percent_divisor` of each one's collateral.

use xusd_common::{
    constants::{
        accounts,
        precision::{DECIMAL_PRECISION, PRICE_PRECISION},
        ratios::ONE_HUNDRED_PCT,
    },
    errors::{XusdError, XusdResult},
    events::{EventLog, XusdEvent},
    math::{mul_div, safe_add, safe_sub, to_u64},
    params::RiskParams,
    traits::{LiquidityBuffer, StableToken},
    types::{Address, PositionOperation, PositionStatus},
};

use crate::domain::{DomainState, OpContext};

// ============ Liquidation Values ============

/// How one liquidated position is split up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiquidationValues {
    /// Debt including pending rewards
    pub entire_debt: u64,
    /// Collateral including pending rewards
    pub entire_coll: u64,
    /// Collateral paid to the liquidator
    pub coll_gas_compensation: u64,
    /// Stablecoin reserve paid to the liquidator
    pub debt_gas_compensation: u64,
    pub debt_to_offset: u64,
    pub coll_to_send_to_sp: u64,
    pub debt_to_redistribute: u64,
    pub coll_to_redistribute: u64,
    /// Collateral left to the owner (capped liquidations only)
    pub coll_surplus: u64,
}

/// Totals of one liquidation entry point call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiquidationOutcome {
    /// Liquidated owners, in processing order
    pub liquidated: Vec<Address>,
    pub total_debt_in_sequence: u64,
    pub total_coll_in_sequence: u64,
    pub total_coll_gas_compensation: u64,
    pub total_debt_gas_compensation: u64,
    pub total_debt_to_offset: u64,
    pub total_coll_to_send_to_sp: u64,
    pub total_debt_to_redistribute: u64,
    pub total_coll_to_redistribute: u64,
    pub total_coll_surplus: u64,
}

impl LiquidationOutcome {
    fn record(&mut self, owner: Address, values: &LiquidationValues) -> XusdResult<()> {
        self.liquidated.push(owner);
        self.total_debt_in_sequence = safe_add(self.total_debt_in_sequence, values.entire_debt)?;
        self.total_coll_in_sequence = safe_add(self.total_coll_in_sequence, values.entire_coll)?;
        self.total_coll_gas_compensation =
            safe_add(self.total_coll_gas_compensation, values.coll_gas_compensation)?;
        self.total_debt_gas_compensation =
            safe_add(self.total_debt_gas_compensation, values.debt_gas_compensation)?;
        self.total_debt_to_offset = safe_add(self.total_debt_to_offset, values.debt_to_offset)?;
        self.total_coll_to_send_to_sp = safe_add(self.total_coll_to_send_to_sp, values.coll_to_send_to_sp)?;
        self.total_debt_to_redistribute =
            safe_add(self.total_debt_to_redistribute, values.debt_to_redistribute)?;
        self.total_coll_to_redistribute =
            safe_add(self.total_coll_to_redistribute, values.coll_to_redistribute)?;
        self.total_coll_surplus = safe_add(self.total_coll_surplus, values.coll_surplus)?;
        Ok(())
    }

    /// Number of positions liquidated
    pub fn count(&self) -> usize {
        self.liquidated.len()
    }
}

// ============ Split Calculations ============

/// Split debt and collateral between the buffer and redistribution
///
/// Returns `(debt_to_offset, coll_to_send_to_sp, debt_to_redistribute, coll_to_redistribute)`.
pub fn offset_and_redistribution_vals(
    debt: u64,
    coll: u64,
    buffer_deposits: u64,
) -> XusdResult<(u64, u64, u64, u64)> {
    if buffer_deposits == 0 || debt == 0 {
        return Ok((0, 0, debt, coll));
    }

    // Offset as much debt as the buffer holds, with a proportional share of collateral
    let debt_to_offset = debt.min(buffer_deposits);
    let coll_to_send_to_sp = to_u64(mul_div(coll as u128, debt_to_offset as u128, debt as u128)?)?;

    Ok((
        debt_to_offset,
        coll_to_send_to_sp,
        debt - debt_to_offset,
        coll - coll_to_send_to_sp,
    ))
}

/// Capped liquidation of a position with MCR <= ICR <= TCR
///
/// Only collateral worth `debt * MCR` is taken; the rest is left to the owner.
pub fn capped_offset_vals(
    entire_debt: u64,
    entire_coll: u64,
    price: u64,
    params: &RiskParams,
) -> XusdResult<LiquidationValues> {
    if price == 0 {
        return Err(XusdError::DivisionByZero);
    }
    let price_factor = (price as u128) * (DECIMAL_PRECISION / PRICE_PRECISION);
    let capped_coll = to_u64(mul_div(entire_debt as u128, params.mcr, price_factor)?)?;
    let coll_gas_compensation = params.coll_gas_compensation(capped_coll);

    Ok(LiquidationValues {
        entire_debt,
        entire_coll,
        coll_gas_compensation,
        debt_gas_compensation: params.gas_compensation,
        debt_to_offset: entire_debt,
        coll_to_send_to_sp: safe_sub(capped_coll, coll_gas_compensation)?,
        debt_to_redistribute: 0,
        coll_to_redistribute: 0,
        coll_surplus: safe_sub(entire_coll, capped_coll)?,
    })
}

// ============ Engine ============

impl<B: LiquidityBuffer> DomainState<B> {
    /// Liquidate one position by address
    pub(crate) fn liquidate<T: StableToken>(
        &mut self,
        owner: &Address,
        liquidator: &Address,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<LiquidationOutcome> {
        self.book.active(owner)?;
        self.batch_liquidate(&[*owner], liquidator, ctx)
    }

    /// Walk up from the riskiest position, visiting at most `n` candidates
    pub(crate) fn liquidate_positions<T: StableToken>(
        &mut self,
        n: u64,
        liquidator: &Address,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<LiquidationOutcome> {
        let mut outcome = LiquidationOutcome::default();
        let mut recovery = self.check_recovery_mode(ctx.price)?;
        let started_in_recovery = recovery;
        let head = self.sorted.first();

        let mut current = self.sorted.last();
        let mut visited = 0u64;
        while let Some(owner) = current {
            if visited >= n || (started_in_recovery && Some(owner) == head) {
                break;
            }
            // The candidate is likely to be unlinked, cache its neighbour first
            let prev = self.sorted.prev(&owner);
            visited += 1;

            let icr = self.current_icr(&owner, ctx.price)?;
            if recovery {
                if icr >= self.params.mcr && self.buffer.total_deposits() == 0 {
                    tracing::debug!(icr = %icr, "buffer empty, stopping recovery mode sequence");
                    break;
                }
                if let Some(values) = self.liquidate_candidate(&owner, icr, true, ctx)? {
                    outcome.record(owner, &values)?;
                }
                recovery = self.check_recovery_mode(ctx.price)?;
            } else if icr < self.params.mcr {
                match self.liquidate_candidate(&owner, icr, false, ctx)? {
                    Some(values) => outcome.record(owner, &values)?,
                    None => break,
                }
            } else {
                break;
            }

            current = prev;
        }

        self.finish_liquidation(outcome, liquidator, ctx)
    }

    /// Liquidate every eligible entry of `targets`, in list order
    pub(crate) fn batch_liquidate<T: StableToken>(
        &mut self,
        targets: &[Address],
        liquidator: &Address,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<LiquidationOutcome> {
        if targets.is_empty() {
            return Err(XusdError::EmptyBatch);
        }

        let mut outcome = LiquidationOutcome::default();
        let mut recovery = self.check_recovery_mode(ctx.price)?;

        for owner in targets {
            if self.book.active(owner).is_err() {
                tracing::trace!("skipping inactive batch entry");
                continue;
            }
            let icr = self.current_icr(owner, ctx.price)?;

            if recovery {
                if icr >= self.params.mcr && self.buffer.total_deposits() == 0 {
                    continue;
                }
                if let Some(values) = self.liquidate_candidate(owner, icr, true, ctx)? {
                    outcome.record(*owner, &values)?;
                }
                recovery = self.check_recovery_mode(ctx.price)?;
            } else if icr < self.params.mcr {
                if let Some(values) = self.liquidate_candidate(owner, icr, false, ctx)? {
                    outcome.record(*owner, &values)?;
                }
            }
        }

        self.finish_liquidation(outcome, liquidator, ctx)
    }

    /// Pick the policy for one candidate and settle it; `None` means skipped
    fn liquidate_candidate<T: StableToken>(
        &mut self,
        owner: &Address,
        icr: u128,
        recovery: bool,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<Option<LiquidationValues>> {
        if self.owners.len() <= 1 {
            tracing::debug!("last active position is never liquidated");
            return Ok(None);
        }

        let values = if recovery {
            let tcr = self.tcr(ctx.price)?;
            self.liquidate_recovery_mode(owner, icr, tcr, ctx.price, ctx.events)?
        } else if icr < self.params.mcr {
            Some(self.liquidate_normal_mode(owner, ctx.events)?)
        } else {
            None
        };

        if let Some(values) = &values {
            self.settle_liquidation(owner, values, ctx)?;
        }
        Ok(values)
    }

    fn liquidate_normal_mode(&mut self, owner: &Address, events: &mut EventLog) -> XusdResult<LiquidationValues> {
        let (entire_debt, entire_coll) = self.begin_liquidation(owner, events)?;
        let values = self.split_values(entire_debt, entire_coll, self.buffer.total_deposits())?;
        tracing::debug!(
            debt = entire_debt,
            offset = values.debt_to_offset,
            redistributed = values.debt_to_redistribute,
            "normal mode liquidation"
        );
        self.end_liquidation(owner, &values, PositionOperation::LiquidateInNormalMode, events)?;
        Ok(values)
    }

    fn liquidate_recovery_mode(
        &mut self,
        owner: &Address,
        icr: u128,
        tcr: u128,
        price: u64,
        events: &mut EventLog,
    ) -> XusdResult<Option<LiquidationValues>> {
        let buffer_deposits = self.buffer.total_deposits();

        let values = if icr <= ONE_HUNDRED_PCT {
            // Under water: the buffer takes nothing
            let (entire_debt, entire_coll) = self.begin_liquidation(owner, events)?;
            let values = self.split_values(entire_debt, entire_coll, 0)?;
            tracing::debug!(icr = %icr, debt = entire_debt, "recovery mode liquidation, pure redistribution");
            values
        } else if icr < self.params.mcr {
            let (entire_debt, entire_coll) = self.begin_liquidation(owner, events)?;
            let values = self.split_values(entire_debt, entire_coll, buffer_deposits)?;
            tracing::debug!(icr = %icr, debt = entire_debt, "recovery mode liquidation below MCR");
            values
        } else if icr <= tcr && self.book.entire_debt_and_coll(owner)?.debt <= buffer_deposits {
            let (entire_debt, entire_coll) = self.begin_liquidation(owner, events)?;
            let values = capped_offset_vals(entire_debt, entire_coll, price, &self.params)?;
            tracing::debug!(icr = %icr, surplus = values.coll_surplus, "recovery mode capped liquidation");
            values
        } else {
            tracing::debug!(icr = %icr, tcr = %tcr, "recovery mode candidate skipped");
            return Ok(None);
        };

        self.end_liquidation(owner, &values, PositionOperation::LiquidateInRecoveryMode, events)?;
        Ok(Some(values))
    }

    /// Crystallize pending rewards and drop the stake, returning entire debt and collateral
    fn begin_liquidation(&mut self, owner: &Address, events: &mut EventLog) -> XusdResult<(u64, u64)> {
        self.apply_pending_rewards(owner, events)?;
        self.remove_stake(owner)?;
        let position = self.book.active(owner)?;
        Ok((position.debt, position.coll))
    }

    fn end_liquidation(
        &mut self,
        owner: &Address,
        values: &LiquidationValues,
        operation: PositionOperation,
        events: &mut EventLog,
    ) -> XusdResult<()> {
        self.close(owner, PositionStatus::ClosedByLiquidation)?;
        events.emit(XusdEvent::PositionLiquidated {
            domain: self.id(),
            owner: *owner,
            debt: values.entire_debt,
            coll: values.entire_coll,
            operation,
        });
        Ok(())
    }

    /// Gas compensation first, then the offset/redistribution split of the rest
    fn split_values(&self, entire_debt: u64, entire_coll: u64, buffer_deposits: u64) -> XusdResult<LiquidationValues> {
        let coll_gas_compensation = self.params.coll_gas_compensation(entire_coll);
        let coll_to_liquidate = safe_sub(entire_coll, coll_gas_compensation)?;
        let (debt_to_offset, coll_to_send_to_sp, debt_to_redistribute, coll_to_redistribute) =
            offset_and_redistribution_vals(entire_debt, coll_to_liquidate, buffer_deposits)?;

        Ok(LiquidationValues {
            entire_debt,
            entire_coll,
            coll_gas_compensation,
            debt_gas_compensation: self.params.gas_compensation,
            debt_to_offset,
            coll_to_send_to_sp,
            debt_to_redistribute,
            coll_to_redistribute,
            coll_surplus: 0,
        })
    }

    /// Move the liquidated amounts out of the active pool
    fn settle_liquidation<T: StableToken>(
        &mut self,
        owner: &Address,
        values: &LiquidationValues,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<()> {
        // 1. Offset against the buffer and burn the cancelled stablecoin
        if values.debt_to_offset > 0 {
            self.buffer.offset(values.debt_to_offset, values.coll_to_send_to_sp)?;
            let account = self.buffer.deposit_account();
            ctx.token.burn(&account, values.debt_to_offset)?;
            self.active_pool.debit_debt(values.debt_to_offset)?;
            self.active_pool.debit_collateral(values.coll_to_send_to_sp)?;
        }

        // 2. Redistribute the remainder over the other stakes
        self.redistribute(values.coll_to_redistribute, values.debt_to_redistribute, ctx.events)?;

        // 3. Surplus for the owner
        self.record_surplus(owner, values.coll_surplus, ctx.events)?;

        // 4. Liquidator's collateral leaves the active pool
        self.active_pool.debit_collateral(values.coll_gas_compensation)?;

        // 5. Rebase future stakes on the new totals
        self.update_system_snapshots(ctx.events)
    }

    fn finish_liquidation<T: StableToken>(
        &mut self,
        outcome: LiquidationOutcome,
        liquidator: &Address,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<LiquidationOutcome> {
        if outcome.liquidated.is_empty() {
            return Err(XusdError::NothingToLiquidate);
        }

        let liquidated_coll = safe_sub(
            outcome.total_coll_in_sequence,
            safe_add(outcome.total_coll_gas_compensation, outcome.total_coll_surplus)?,
        )?;
        ctx.events.emit(XusdEvent::Liquidation {
            domain: self.id(),
            liquidator: *liquidator,
            liquidated_debt: outcome.total_debt_in_sequence,
            liquidated_coll,
            coll_gas_compensation: outcome.total_coll_gas_compensation,
            debt_gas_compensation: outcome.total_debt_gas_compensation,
            timestamp: ctx.now,
        });

        ctx.token
            .transfer(&accounts::GAS_POOL, liquidator, outcome.total_debt_gas_compensation)?;

        if self.buffer.total_deposits() > 0 {
            self.buffer.trigger_issuance(ctx.now);
        }

        tracing::debug!(
            count = outcome.count(),
            debt = outcome.total_debt_in_sequence,
            "liquidation call settled"
        );
        Ok(outcome)
    }
}
