//! Redemption Engine
//!
//! Swaps stablecoin for collateral at face value against the positions with
//! the lowest collateral ratio still at or above MCR. Fully redeemed
//! positions are closed and their leftover collateral becomes claimable
//! surplus. At most one position per call ends up partially redeemed, and it
//! is re-sorted with the caller's hints (or a local search when they are
//! stale).
//!
//! A fee in collateral is charged at `min(redemption_fee_floor + base_rate, 100%)`,
//! after the base rate has been bumped by this call's share of the system debt.

use xusd_common::{
    constants::{accounts, precision::DECIMAL_PRECISION},
    errors::{XusdError, XusdResult},
    events::XusdEvent,
    fees::{calc_redemption_rate, fee_for},
    math::{collateral_for_debt, collateral_value, compute_nominal_cr, mul_div, safe_add, safe_sub},
    traits::{LiquidityBuffer, StableToken},
    types::{Address, PositionOperation, PositionStatus},
};

use crate::domain::{DomainState, OpContext};

// ============ Request / Outcome ============

/// Parameters of one redemption call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionRequest {
    /// Stablecoin to redeem
    pub amount: u64,
    /// Expected first position to redeem from
    pub first_hint: Option<Address>,
    /// Neighbours for re-inserting the partially redeemed position
    pub upper_partial_hint: Option<Address>,
    pub lower_partial_hint: Option<Address>,
    /// Expected nominal ratio of the partially redeemed position
    pub partial_nicr: u128,
    /// Positions to visit at most, 0 for unlimited
    pub max_iterations: u64,
    /// Highest acceptable fee rate (1e18 = 100%)
    pub max_fee_percentage: u128,
}

impl RedemptionRequest {
    /// Request without hints and without an iteration cap
    pub fn new(amount: u64, max_fee_percentage: u128) -> Self {
        Self {
            amount,
            first_hint: None,
            upper_partial_hint: None,
            lower_partial_hint: None,
            partial_nicr: 0,
            max_iterations: 0,
            max_fee_percentage,
        }
    }

    pub fn with_first_hint(mut self, first_hint: Option<Address>) -> Self {
        self.first_hint = first_hint;
        self
    }

    pub fn with_partial_hints(mut self, nicr: u128, upper: Option<Address>, lower: Option<Address>) -> Self {
        self.partial_nicr = nicr;
        self.upper_partial_hint = upper;
        self.lower_partial_hint = lower;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// What a redemption call did
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedemptionOutcome {
    pub attempted_amount: u64,
    /// Stablecoin burned from the redeemer
    pub redeemed_amount: u64,
    /// Collateral taken from positions, fee included
    pub coll_drawn: u64,
    /// Collateral fee routed to `accounts::FEE_RECIPIENT`
    pub coll_fee: u64,
    /// Collateral paid to the redeemer
    pub coll_to_redeemer: u64,
    /// Positions closed by this call
    pub closed: Vec<Address>,
    /// Position left partially redeemed, if any
    pub partially_redeemed: Option<Address>,
    /// Base rate after this call
    pub base_rate: u128,
}

enum RedemptionStep {
    Redeemed { debt_lot: u64, coll_lot: u64, closed: bool },
    Skipped,
    Stop,
}

// ============ Engine ============

impl<B: LiquidityBuffer> DomainState<B> {
    /// Redeem `request.amount` stablecoin from `redeemer` against the weakest positions
    pub(crate) fn redeem_collateral<T: StableToken>(
        &mut self,
        redeemer: &Address,
        request: &RedemptionRequest,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<RedemptionOutcome> {
        // 1. Max fee must lie between the floor and 100%
        if request.max_fee_percentage < self.params.redemption_fee_floor
            || request.max_fee_percentage > DECIMAL_PRECISION
        {
            return Err(XusdError::InvalidMaxFeePercentage {
                max_fee_percentage: request.max_fee_percentage,
            });
        }

        // 2. Amount must be positive
        if request.amount == 0 {
            return Err(XusdError::ZeroAmount);
        }

        // 3. System must be at or above MCR
        let tcr = self.tcr(ctx.price)?;
        if tcr < self.params.mcr {
            return Err(XusdError::TcrBelowMcr { tcr, mcr: self.params.mcr });
        }

        // 4. Redeemer must hold the stablecoin
        let balance = ctx.token.balance_of(redeemer);
        if balance < request.amount {
            return Err(XusdError::InsufficientCallerBalance {
                balance,
                requested: request.amount,
            });
        }

        // 5. There must be debt to redeem against
        let total_debt_at_start = self.entire_system_debt()?;
        if total_debt_at_start == 0 {
            return Err(XusdError::ZeroSystemDebt);
        }

        // 6. Walk up from the first position at or above MCR
        let mut current = if self.is_valid_first_redemption_hint(request.first_hint, ctx.price)? {
            request.first_hint
        } else {
            tracing::trace!("first redemption hint rejected, scanning from the tail");
            self.first_redeemable(ctx.price)?
        };

        let mut outcome = RedemptionOutcome {
            attempted_amount: request.amount,
            ..RedemptionOutcome::default()
        };
        let mut remaining = request.amount;
        let mut iterations_left = if request.max_iterations == 0 {
            u64::MAX
        } else {
            request.max_iterations
        };

        while let Some(owner) = current {
            if remaining == 0 || iterations_left == 0 {
                break;
            }
            iterations_left -= 1;
            let next = self.sorted.prev(&owner);

            self.apply_pending_rewards(&owner, ctx.events)?;
            match self.redeem_from_position(&owner, remaining, request, ctx)? {
                RedemptionStep::Redeemed { debt_lot, coll_lot, closed } => {
                    remaining -= debt_lot;
                    outcome.redeemed_amount = safe_add(outcome.redeemed_amount, debt_lot)?;
                    outcome.coll_drawn = safe_add(outcome.coll_drawn, coll_lot)?;
                    if closed {
                        outcome.closed.push(owner);
                    } else {
                        outcome.partially_redeemed = Some(owner);
                    }
                }
                RedemptionStep::Skipped => {}
                RedemptionStep::Stop => break,
            }

            current = next;
        }

        if outcome.coll_drawn == 0 {
            return Err(XusdError::UnableToRedeem);
        }

        // 7. Bump the base rate by the redeemed share of the system debt
        let drawn_value = collateral_value(outcome.coll_drawn, ctx.price)?;
        let redeemed_fraction = mul_div(drawn_value as u128, DECIMAL_PRECISION, total_debt_at_start as u128)?;
        let last_fee_time = self.fees.last_fee_operation_time;
        outcome.base_rate = self.fees.update_from_redemption(redeemed_fraction, ctx.now)?;
        ctx.events.emit(XusdEvent::BaseRateUpdated {
            domain: self.id(),
            base_rate: outcome.base_rate,
        });
        if self.fees.last_fee_operation_time != last_fee_time {
            ctx.events.emit(XusdEvent::LastFeeOpTimeUpdated {
                domain: self.id(),
                timestamp: self.fees.last_fee_operation_time,
            });
        }

        // 8. Fee checks, before any stablecoin leaves the redeemer
        let rate = calc_redemption_rate(&self.params, outcome.base_rate);
        let fee = fee_for(rate, outcome.coll_drawn)?;
        let fee_percentage = mul_div(fee as u128, DECIMAL_PRECISION, outcome.coll_drawn as u128)?;
        if fee_percentage > request.max_fee_percentage {
            return Err(XusdError::FeeExceedsMax {
                fee_percentage,
                max_fee_percentage: request.max_fee_percentage,
            });
        }
        if fee >= outcome.coll_drawn {
            return Err(XusdError::FeeConsumesAllCollateral {
                fee,
                collateral_drawn: outcome.coll_drawn,
            });
        }
        outcome.coll_fee = fee;
        outcome.coll_to_redeemer = outcome.coll_drawn - fee;

        // 9. Settle
        ctx.token.burn(redeemer, outcome.redeemed_amount)?;
        self.active_pool.debit_debt(outcome.redeemed_amount)?;
        self.active_pool.debit_collateral(outcome.coll_drawn)?;

        tracing::debug!(
            redeemed = outcome.redeemed_amount,
            coll_drawn = outcome.coll_drawn,
            fee,
            fee_recipient = ?accounts::FEE_RECIPIENT,
            "redemption settled"
        );
        ctx.events.emit(XusdEvent::Redemption {
            domain: self.id(),
            redeemer: *redeemer,
            attempted_amount: request.amount,
            actual_amount: outcome.redeemed_amount,
            coll_sent: outcome.coll_to_redeemer,
            coll_fee: fee,
            timestamp: ctx.now,
        });

        Ok(outcome)
    }

    fn redeem_from_position<T: StableToken>(
        &mut self,
        owner: &Address,
        remaining: u64,
        request: &RedemptionRequest,
        ctx: &mut OpContext<'_, T>,
    ) -> XusdResult<RedemptionStep> {
        let position = *self.book.active(owner)?;
        let gas_compensation = self.params.gas_compensation;

        // Never touch the gas compensation reserve
        let debt_lot = remaining.min(self.params.net_debt(position.debt));
        let coll_lot = collateral_for_debt(debt_lot, ctx.price)?;
        let new_debt = safe_sub(position.debt, debt_lot)?;
        let new_coll = safe_sub(position.coll, coll_lot)?;

        if new_debt == gas_compensation {
            if self.owners.len() <= 1 {
                tracing::debug!("last active position is never closed by redemption");
                return Ok(RedemptionStep::Stop);
            }

            self.remove_stake(owner)?;
            self.close(owner, PositionStatus::ClosedByRedemption)?;

            // Burn the reserve and leave the remaining collateral to the owner
            ctx.token.burn(&accounts::GAS_POOL, gas_compensation)?;
            self.active_pool.debit_debt(gas_compensation)?;
            self.record_surplus(owner, new_coll, ctx.events)?;
            self.emit_position_updated(owner, PositionOperation::RedeemCollateral, ctx.events);

            tracing::debug!(debt_lot, coll_lot, surplus = new_coll, "position fully redeemed");
            return Ok(RedemptionStep::Redeemed { debt_lot, coll_lot, closed: true });
        }

        let new_nicr = compute_nominal_cr(new_coll, new_debt)?;
        if new_nicr != request.partial_nicr {
            tracing::trace!(expected = %request.partial_nicr, actual = %new_nicr, "partial redemption hint is stale");
        }
        if self.params.net_debt(new_debt) < self.params.min_net_debt {
            tracing::debug!(new_debt, "partial redemption would leave less than the minimum net debt, skipping");
            return Ok(RedemptionStep::Skipped);
        }

        self.set_position_amounts(owner, new_coll, new_debt)?;
        self.update_stake_and_total_stakes(owner, ctx.events)?;
        self.reposition(owner, request.upper_partial_hint, request.lower_partial_hint, ctx.events)?;
        self.emit_position_updated(owner, PositionOperation::RedeemCollateral, ctx.events);

        tracing::debug!(debt_lot, coll_lot, "position partially redeemed");
        Ok(RedemptionStep::Redeemed { debt_lot, coll_lot, closed: false })
    }

    /// A valid hint is active, at or above MCR, with its lower neighbour below MCR
    fn is_valid_first_redemption_hint(&self, hint: Option<Address>, price: u64) -> XusdResult<bool> {
        let Some(hint) = hint else {
            return Ok(false);
        };
        if !self.sorted.contains(&hint) || self.current_icr(&hint, price)? < self.params.mcr {
            return Ok(false);
        }
        match self.sorted.next(&hint) {
            None => Ok(true),
            Some(lower) => Ok(self.current_icr(&lower, price)? < self.params.mcr),
        }
    }

    /// Lowest position with ICR at or above MCR
    pub(crate) fn first_redeemable(&self, price: u64) -> XusdResult<Option<Address>> {
        let mut current = self.sorted.last();
        while let Some(owner) = current {
            if self.current_icr(&owner, price)? >= self.params.mcr {
                break;
            }
            current = self.sorted.prev(&owner);
        }
        Ok(current)
    }
}
