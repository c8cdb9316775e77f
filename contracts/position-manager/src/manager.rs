//! Position Manager
//!
//! Owns the price feed, the stablecoin ledger and one [`DomainState`] per
//! collateral domain. Every state-changing entry point runs on a working
//! copy of the domain and the ledger and commits both, together with the
//! call's events, only when it returns `Ok`.

use xusd_common::{
    errors::{XusdError, XusdResult},
    events::{EventLog, XusdEvent},
    params::RiskParams,
    traits::{LiquidityBuffer, PriceFeed, StableToken},
    types::{Address, DomainId, Position, PositionStatus},
    BTreeMap,
};

use crate::domain::{DomainState, EntireDebtAndColl, OpContext};
use crate::hints::{ApproxHint, RedemptionHints};
use crate::liquidation::LiquidationOutcome;
use crate::redemption::{RedemptionOutcome, RedemptionRequest};
use crate::rewards::RewardState;

/// Multi-domain liquidation, redistribution and redemption engine
#[derive(Debug, Clone)]
pub struct PositionManager<F, T, B> {
    oracle: F,
    token: T,
    domains: BTreeMap<DomainId, DomainState<B>>,
    /// Block timestamp (seconds) used by fee decay and events
    now: u64,
    events: EventLog,
}

impl<F, T, B> PositionManager<F, T, B>
where
    F: PriceFeed,
    T: StableToken + Clone,
    B: LiquidityBuffer + Clone,
{
    pub fn new(oracle: F, token: T) -> Self {
        Self {
            oracle,
            token,
            domains: BTreeMap::new(),
            now: 0,
            events: EventLog::new(),
        }
    }

    // ============ Setup ============

    /// Add a collateral domain with its own parameters and buffer
    pub fn register_domain(&mut self, id: DomainId, params: RiskParams, buffer: B) -> XusdResult<()> {
        if self.domains.contains_key(&id) {
            return Err(XusdError::DomainAlreadyExists { domain: id });
        }
        let state = DomainState::new(id, params, buffer)?;
        self.domains.insert(id, state);
        self.events.emit(XusdEvent::DomainRegistered { domain: id });
        tracing::debug!(domain = ?id, "domain registered");
        Ok(())
    }

    pub fn set_timestamp(&mut self, now: u64) {
        self.now = now;
    }

    pub fn timestamp(&self) -> u64 {
        self.now
    }

    pub fn oracle(&self) -> &F {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut F {
        &mut self.oracle
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    pub fn domain(&self, id: &DomainId) -> XusdResult<&DomainState<B>> {
        self.domains.get(id).ok_or(XusdError::UnknownDomain { domain: *id })
    }

    /// Direct access to a domain's buffer for deposit bookkeeping
    pub fn buffer_mut(&mut self, id: &DomainId) -> XusdResult<&mut B> {
        self.domains
            .get_mut(id)
            .map(DomainState::buffer_mut)
            .ok_or(XusdError::UnknownDomain { domain: *id })
    }

    pub fn domain_ids(&self) -> Vec<DomainId> {
        self.domains.keys().copied().collect()
    }

    /// Events committed so far
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Atomic Execution ============

    fn execute<R>(
        &mut self,
        domain: &DomainId,
        op: impl FnOnce(&mut DomainState<B>, &mut OpContext<'_, T>) -> XusdResult<R>,
    ) -> XusdResult<R> {
        let price = self.oracle.current_price(domain)?;
        let mut state = self.domain(domain)?.clone();
        let mut token = self.token.clone();
        let mut events = EventLog::new();

        let result = {
            let mut ctx = OpContext {
                token: &mut token,
                events: &mut events,
                price,
                now: self.now,
            };
            op(&mut state, &mut ctx)?
        };

        self.domains.insert(*domain, state);
        self.token = token;
        self.events.extend(events);
        Ok(result)
    }

    fn domain_mut(&mut self, id: &DomainId) -> XusdResult<&mut DomainState<B>> {
        self.domains.get_mut(id).ok_or(XusdError::UnknownDomain { domain: *id })
    }

    // ============ Liquidation ============

    /// Liquidate one position
    pub fn liquidate(
        &mut self,
        domain: &DomainId,
        owner: &Address,
        liquidator: &Address,
    ) -> XusdResult<LiquidationOutcome> {
        self.execute(domain, |state, ctx| state.liquidate(owner, liquidator, ctx))
    }

    /// Liquidate up to `n` positions starting from the lowest ratio
    pub fn liquidate_positions(
        &mut self,
        domain: &DomainId,
        n: u64,
        liquidator: &Address,
    ) -> XusdResult<LiquidationOutcome> {
        self.execute(domain, |state, ctx| state.liquidate_positions(n, liquidator, ctx))
    }

    /// Liquidate the eligible entries of `targets`
    pub fn batch_liquidate(
        &mut self,
        domain: &DomainId,
        targets: &[Address],
        liquidator: &Address,
    ) -> XusdResult<LiquidationOutcome> {
        self.execute(domain, |state, ctx| state.batch_liquidate(targets, liquidator, ctx))
    }

    // ============ Redemption ============

    pub fn redeem_collateral(
        &mut self,
        domain: &DomainId,
        redeemer: &Address,
        request: &RedemptionRequest,
    ) -> XusdResult<RedemptionOutcome> {
        self.execute(domain, |state, ctx| state.redeem_collateral(redeemer, request, ctx))
    }

    // ============ Borrower Hooks ============

    pub fn open_position(
        &mut self,
        domain: &DomainId,
        owner: &Address,
        coll: u64,
        net_debt: u64,
        upper_hint: Option<Address>,
        lower_hint: Option<Address>,
    ) -> XusdResult<()> {
        self.execute(domain, |state, ctx| {
            state.open_position(owner, coll, net_debt, upper_hint, lower_hint, ctx)
        })
    }

    pub fn adjust_position(
        &mut self,
        domain: &DomainId,
        owner: &Address,
        coll_change: i64,
        debt_change: i64,
        upper_hint: Option<Address>,
        lower_hint: Option<Address>,
    ) -> XusdResult<()> {
        self.execute(domain, |state, ctx| {
            state.adjust_position(owner, coll_change, debt_change, upper_hint, lower_hint, ctx)
        })
    }

    /// Close the owner's position, returning its collateral
    pub fn close_position(&mut self, domain: &DomainId, owner: &Address) -> XusdResult<u64> {
        self.execute(domain, |state, ctx| state.close_position(owner, ctx))
    }

    pub fn claim_collateral_surplus(&mut self, domain: &DomainId, owner: &Address) -> XusdResult<u64> {
        let mut events = EventLog::new();
        let amount = self.domain_mut(domain)?.claim_collateral_surplus(owner, &mut events)?;
        self.events.extend(events);
        Ok(amount)
    }

    pub fn decay_base_rate_from_borrowing(&mut self, domain: &DomainId) -> XusdResult<u128> {
        let now = self.now;
        let mut events = EventLog::new();
        let base_rate = self.domain_mut(domain)?.decay_base_rate_from_borrowing(now, &mut events)?;
        self.events.extend(events);
        Ok(base_rate)
    }

    // ============ Read-only Accessors ============

    pub fn get_current_icr(&self, domain: &DomainId, owner: &Address, price: u64) -> XusdResult<u128> {
        self.domain(domain)?.current_icr(owner, price)
    }

    pub fn get_nominal_icr(&self, domain: &DomainId, owner: &Address) -> XusdResult<u128> {
        self.domain(domain)?.nominal_icr(owner)
    }

    pub fn get_entire_system_coll(&self, domain: &DomainId) -> XusdResult<u64> {
        self.domain(domain)?.entire_system_coll()
    }

    pub fn get_entire_system_debt(&self, domain: &DomainId) -> XusdResult<u64> {
        self.domain(domain)?.entire_system_debt()
    }

    pub fn get_pending_coll_reward(&self, domain: &DomainId, owner: &Address) -> XusdResult<u64> {
        Ok(self.get_entire_debt_and_coll(domain, owner)?.pending_coll)
    }

    pub fn get_pending_debt_reward(&self, domain: &DomainId, owner: &Address) -> XusdResult<u64> {
        Ok(self.get_entire_debt_and_coll(domain, owner)?.pending_debt)
    }

    pub fn has_pending_rewards(&self, domain: &DomainId, owner: &Address) -> XusdResult<bool> {
        let state = self.domain(domain)?;
        Ok(state
            .book()
            .get(owner)
            .is_some_and(|position| state.rewards().has_pending(position)))
    }

    /// Recovery mode at the oracle's current price
    pub fn check_recovery_mode(&self, domain: &DomainId) -> XusdResult<bool> {
        let price = self.oracle.current_price(domain)?;
        self.domain(domain)?.check_recovery_mode(price)
    }

    pub fn get_tcr(&self, domain: &DomainId, price: u64) -> XusdResult<u128> {
        self.domain(domain)?.tcr(price)
    }

    /// Stored position record, zeroed for unknown owners
    pub fn get_position(&self, domain: &DomainId, owner: &Address) -> XusdResult<Position> {
        Ok(self.domain(domain)?.book().get(owner).copied().unwrap_or_default())
    }

    pub fn get_position_status(&self, domain: &DomainId, owner: &Address) -> XusdResult<PositionStatus> {
        Ok(self.get_position(domain, owner)?.status)
    }

    pub fn get_position_stake(&self, domain: &DomainId, owner: &Address) -> XusdResult<u64> {
        Ok(self.get_position(domain, owner)?.stake)
    }

    pub fn get_position_owners_count(&self, domain: &DomainId) -> XusdResult<usize> {
        Ok(self.domain(domain)?.owners_count())
    }

    pub fn get_position_from_owners_array(&self, domain: &DomainId, index: usize) -> XusdResult<Option<Address>> {
        Ok(self.domain(domain)?.owner_at(index))
    }

    pub fn get_entire_debt_and_coll(&self, domain: &DomainId, owner: &Address) -> XusdResult<EntireDebtAndColl> {
        self.domain(domain)?.book().entire_debt_and_coll(owner)
    }

    pub fn get_reward_state(&self, domain: &DomainId) -> XusdResult<RewardState> {
        Ok(*self.domain(domain)?.rewards())
    }

    pub fn get_base_rate(&self, domain: &DomainId) -> XusdResult<u128> {
        Ok(self.domain(domain)?.fees().base_rate)
    }

    pub fn get_index_size(&self, domain: &DomainId) -> XusdResult<u64> {
        Ok(self.domain(domain)?.sorted().size())
    }

    pub fn get_collateral_surplus(&self, domain: &DomainId, owner: &Address) -> XusdResult<u64> {
        Ok(self.domain(domain)?.surplus().balance_of(owner))
    }

    // ============ Hints ============

    pub fn get_redemption_hints(
        &self,
        domain: &DomainId,
        amount: u64,
        price: u64,
        max_iterations: u64,
    ) -> XusdResult<RedemptionHints> {
        self.domain(domain)?.get_redemption_hints(amount, price, max_iterations)
    }

    pub fn get_approx_hint(
        &self,
        domain: &DomainId,
        nicr: u128,
        num_trials: u64,
        seed: [u8; 32],
    ) -> XusdResult<ApproxHint> {
        self.domain(domain)?.get_approx_hint(nicr, num_trials, seed)
    }

    pub fn find_insert_position(
        &self,
        domain: &DomainId,
        nicr: u128,
        prev_hint: Option<Address>,
        next_hint: Option<Address>,
    ) -> XusdResult<(Option<Address>, Option<Address>)> {
        self.domain(domain)?.find_insert_position(nicr, prev_hint, next_hint)
    }

    // ============ Fees ============

    pub fn redemption_rate(&self, domain: &DomainId) -> XusdResult<u128> {
        let state = self.domain(domain)?;
        Ok(state.fees().redemption_rate(state.params()))
    }

    pub fn redemption_rate_with_decay(&self, domain: &DomainId) -> XusdResult<u128> {
        let state = self.domain(domain)?;
        state.fees().redemption_rate_with_decay(state.params(), self.now)
    }

    /// Fee on `coll_drawn` at the decayed redemption rate
    pub fn redemption_fee_with_decay(&self, domain: &DomainId, coll_drawn: u64) -> XusdResult<u64> {
        let state = self.domain(domain)?;
        state.fees().redemption_fee_with_decay(state.params(), coll_drawn, self.now)
    }

    pub fn borrowing_rate(&self, domain: &DomainId) -> XusdResult<u128> {
        let state = self.domain(domain)?;
        Ok(state.fees().borrowing_rate(state.params()))
    }

    pub fn borrowing_rate_with_decay(&self, domain: &DomainId) -> XusdResult<u128> {
        let state = self.domain(domain)?;
        state.fees().borrowing_rate_with_decay(state.params(), self.now)
    }

    pub fn borrowing_fee(&self, domain: &DomainId, debt: u64) -> XusdResult<u64> {
        let state = self.domain(domain)?;
        state.fees().borrowing_fee(state.params(), debt)
    }
}
