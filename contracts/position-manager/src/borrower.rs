//! Borrower Hooks
//!
//! The position-changing effects a borrower front end routes through the
//! engine. Each hook syncs pending rewards before it reads a position and
//! refreshes the stake and the index slot after it writes one.

use xusd_common::{
    constants::accounts,
    errors::{RecoveryModeOp, XusdError, XusdResult},
    events::{EventLog, XusdEvent},
    math::{compute_cr, is_recovery_mode, safe_add, safe_sub},
    traits::{LiquidityBuffer, StableToken},
    types::{Address, PositionOperation, PositionStatus},
};

use crate::domain::{DomainState, OpContext};

impl<B: LiquidityBuffer> DomainState<B> {
    /// Open a position with `coll` collateral and `net_debt` stablecoin drawn
    pub(crate) fn open_position<T: StableToken>(
        &mut self,
        owner: &Address,
        coll: u64,
        net_debt: u64,
        upper_hint: Option<Address>,
        lower_hint: Option<Address>,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<()> {
        // 1. Amounts
        if coll == 0 {
            return Err(XusdError::ZeroAmount);
        }
        if net_debt < self.params.min_net_debt {
            return Err(XusdError::BelowMinimum {
                amount: net_debt,
                minimum: self.params.min_net_debt,
            });
        }
        let debt = self.params.composite_debt(net_debt)?;

        // 2. Ratios for the current mode
        let icr = compute_cr(coll, debt, ctx.price)?;
        let tcr = self.tcr(ctx.price)?;
        if is_recovery_mode(tcr, self.params.ccr) {
            require_ratio(icr, self.params.ccr)?;
        } else {
            require_ratio(icr, self.params.mcr)?;
            let new_tcr = self.tcr_after(coll as i128, debt as i128, ctx.price)?;
            require_tcr_above_ccr(tcr, new_tcr, self.params.ccr)?;
        }

        // 3. Record, stake and index
        self.activate(owner, coll, debt)?;
        self.update_stake_and_total_stakes(owner, ctx.events)?;
        self.reposition(owner, upper_hint, lower_hint, ctx.events)?;
        self.active_pool.credit_collateral(coll)?;
        self.active_pool.credit_debt(debt)?;

        // 4. Issue the stablecoin and the gas reserve
        ctx.token.mint(owner, net_debt)?;
        ctx.token.mint(&accounts::GAS_POOL, self.params.gas_compensation)?;

        tracing::debug!(coll, debt, icr = %icr, "position opened");
        self.emit_position_updated(owner, PositionOperation::OpenPosition, ctx.events);
        Ok(())
    }

    /// Add or withdraw collateral and draw or repay debt in one step
    pub(crate) fn adjust_position<T: StableToken>(
        &mut self,
        owner: &Address,
        coll_change: i64,
        debt_change: i64,
        upper_hint: Option<Address>,
        lower_hint: Option<Address>,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<()> {
        // 1. Something must change
        if coll_change == 0 && debt_change == 0 {
            return Err(XusdError::ZeroAmount);
        }
        self.apply_pending_rewards(owner, ctx.events)?;
        let position = *self.book.active(owner)?;

        // 2. Recovery mode forbids pulling collateral out
        let tcr = self.tcr(ctx.price)?;
        let recovery = is_recovery_mode(tcr, self.params.ccr);
        if recovery && coll_change < 0 {
            return Err(XusdError::RecoveryModeRestriction {
                operation: RecoveryModeOp::WithdrawCollateral,
            });
        }

        // 3. The reserve stays covered and the net debt stays above the minimum
        let new_coll = apply_change(position.coll, coll_change)?;
        let new_debt = apply_change(position.debt, debt_change)?;
        let new_net_debt = self.params.net_debt(new_debt);
        if new_debt < self.params.gas_compensation || new_net_debt < self.params.min_net_debt {
            return Err(XusdError::BelowMinimum {
                amount: new_net_debt,
                minimum: self.params.min_net_debt,
            });
        }

        // 4. Ratios for the current mode
        let new_icr = compute_cr(new_coll, new_debt, ctx.price)?;
        if recovery {
            if debt_change > 0 {
                let old_icr = compute_cr(position.coll, position.debt, ctx.price)?;
                require_ratio(new_icr, self.params.ccr)?;
                require_ratio(new_icr, old_icr)?;
            }
        } else {
            require_ratio(new_icr, self.params.mcr)?;
            let new_tcr = self.tcr_after(coll_change as i128, debt_change as i128, ctx.price)?;
            require_tcr_above_ccr(tcr, new_tcr, self.params.ccr)?;
        }

        // 5. Apply
        self.set_position_amounts(owner, new_coll, new_debt)?;
        self.update_stake_and_total_stakes(owner, ctx.events)?;
        self.reposition(owner, upper_hint, lower_hint, ctx.events)?;

        let coll_amount = coll_change.unsigned_abs();
        let debt_amount = debt_change.unsigned_abs();
        if coll_change > 0 {
            self.active_pool.credit_collateral(coll_amount)?;
        } else {
            self.active_pool.debit_collateral(coll_amount)?;
        }
        if debt_change > 0 {
            self.active_pool.credit_debt(debt_amount)?;
            ctx.token.mint(owner, debt_amount)?;
        } else {
            ctx.token.burn(owner, debt_amount)?;
            self.active_pool.debit_debt(debt_amount)?;
        }

        tracing::debug!(coll_change, debt_change, "position adjusted");
        self.emit_position_updated(owner, PositionOperation::AdjustPosition, ctx.events);
        Ok(())
    }

    /// Repay everything and return the position's collateral
    pub(crate) fn close_position<T: StableToken>(
        &mut self,
        owner: &Address,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<u64> {
        self.book.active(owner)?;

        // 1. Not in recovery mode, never the last position
        let tcr = self.tcr(ctx.price)?;
        if is_recovery_mode(tcr, self.params.ccr) {
            return Err(XusdError::RecoveryModeRestriction {
                operation: RecoveryModeOp::ClosePosition,
            });
        }
        if self.owners.len() <= 1 {
            return Err(XusdError::OnlyOnePositionInSystem);
        }

        // 2. Settle rewards and check the system without this position
        self.apply_pending_rewards(owner, ctx.events)?;
        let position = *self.book.active(owner)?;
        let new_tcr = self.tcr_after(-(position.coll as i128), -(position.debt as i128), ctx.price)?;
        require_tcr_above_ccr(tcr, new_tcr, self.params.ccr)?;

        // 3. Repay the net debt and retire the reserve
        let net_debt = self.params.net_debt(position.debt);
        let reserve = position.debt - net_debt;
        ctx.token.burn(owner, net_debt)?;
        ctx.token.burn(&accounts::GAS_POOL, reserve)?;
        self.active_pool.debit_debt(position.debt)?;
        self.active_pool.debit_collateral(position.coll)?;

        // 4. Unlink
        self.remove_stake(owner)?;
        self.close(owner, PositionStatus::ClosedByOwner)?;

        tracing::debug!(coll = position.coll, debt = position.debt, "position closed by owner");
        self.emit_position_updated(owner, PositionOperation::ClosePosition, ctx.events);
        Ok(position.coll)
    }

    /// Pay out the owner's whole surplus balance
    pub(crate) fn claim_collateral_surplus(&mut self, owner: &Address, events: &mut EventLog) -> XusdResult<u64> {
        let amount = self.surplus.claim(owner)?;
        events.emit(XusdEvent::CollSurplusClaimed {
            domain: self.id(),
            owner: *owner,
            amount,
        });
        Ok(amount)
    }

    /// Decay the base rate as a borrowing operation does
    pub(crate) fn decay_base_rate_from_borrowing(&mut self, now: u64, events: &mut EventLog) -> XusdResult<u128> {
        let last_fee_time = self.fees.last_fee_operation_time;
        let base_rate = self.fees.decay_from_borrowing(now)?;
        events.emit(XusdEvent::BaseRateUpdated {
            domain: self.id(),
            base_rate,
        });
        if self.fees.last_fee_operation_time != last_fee_time {
            events.emit(XusdEvent::LastFeeOpTimeUpdated {
                domain: self.id(),
                timestamp: self.fees.last_fee_operation_time,
            });
        }
        Ok(base_rate)
    }

    /// TCR after adding signed collateral and debt deltas to the system
    fn tcr_after(&self, coll_delta: i128, debt_delta: i128, price: u64) -> XusdResult<u128> {
        let coll = shift(self.entire_system_coll()?, coll_delta)?;
        let debt = shift(self.entire_system_debt()?, debt_delta)?;
        compute_cr(coll, debt, price)
    }
}

fn require_ratio(ratio: u128, required: u128) -> XusdResult<()> {
    if ratio < required {
        return Err(XusdError::Undercollateralized {
            current_ratio: ratio,
            required_ratio: required,
        });
    }
    Ok(())
}

fn require_tcr_above_ccr(current_tcr: u128, new_tcr: u128, ccr: u128) -> XusdResult<()> {
    if new_tcr < ccr {
        return Err(XusdError::WouldWorsenTcr { current_tcr, new_tcr });
    }
    Ok(())
}

fn apply_change(value: u64, change: i64) -> XusdResult<u64> {
    if change >= 0 {
        safe_add(value, change as u64)
    } else {
        safe_sub(value, change.unsigned_abs())
    }
}

fn shift(value: u64, delta: i128) -> XusdResult<u64> {
    let shifted = (value as i128).checked_add(delta).ok_or(XusdError::Overflow)?;
    u64::try_from(shifted).map_err(|_| XusdError::Underflow)
}
