//! Domain State
//!
//! Everything one collateral domain owns: the position ledger, the reward
//! accumulators, the ordered index, the dense owners array, the pools, the
//! fee state and the liquidity buffer. Domains never share state.
//!
//! Every position-touching path goes through [`DomainState::apply_pending_rewards`]
//! first so the accumulators stay consistent with the pools.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use xusd_common::{
    errors::{XusdError, XusdResult},
    events::{EventLog, XusdEvent},
    fees::BaseRate,
    math::{compute_cr, compute_nominal_cr, is_recovery_mode, safe_add},
    params::RiskParams,
    pools::{CollSurplusPool, PoolLedger},
    sorted_positions::{NominalRatioSource, SortedPositions},
    traits::LiquidityBuffer,
    types::{Address, DomainId, Position, PositionOperation, PositionStatus, RewardSnapshot},
    BTreeMap,
};

use crate::rewards::RewardState;

// ============ Operation Context ============

/// Collaborators and inputs shared by one entry point call
pub struct OpContext<'a, T> {
    /// Working copy of the stablecoin ledger
    pub token: &'a mut T,
    /// Events of this call, committed with the state
    pub events: &'a mut EventLog,
    /// Collateral price (8 decimals) for this call
    pub price: u64,
    /// Block timestamp (seconds)
    pub now: u64,
}

// ============ Position Book ============

/// Collateral and debt of a position including pending rewards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntireDebtAndColl {
    pub debt: u64,
    pub coll: u64,
    pub pending_debt: u64,
    pub pending_coll: u64,
}

/// Position records plus the accumulators needed to value them
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PositionBook {
    positions: BTreeMap<Address, Position>,
    rewards: RewardState,
}

impl PositionBook {
    pub fn get(&self, owner: &Address) -> Option<&Position> {
        self.positions.get(owner)
    }

    pub fn rewards(&self) -> &RewardState {
        &self.rewards
    }

    /// Active position of `owner`
    pub fn active(&self, owner: &Address) -> XusdResult<&Position> {
        self.positions
            .get(owner)
            .filter(|p| p.status.is_active())
            .ok_or(XusdError::InvalidTarget { owner: *owner })
    }

    fn active_mut(&mut self, owner: &Address) -> XusdResult<&mut Position> {
        self.positions
            .get_mut(owner)
            .filter(|p| p.status.is_active())
            .ok_or(XusdError::InvalidTarget { owner: *owner })
    }

    /// Raw values plus pending rewards; zeros for unknown owners
    pub fn entire_debt_and_coll(&self, owner: &Address) -> XusdResult<EntireDebtAndColl> {
        let Some(position) = self.positions.get(owner) else {
            return Ok(EntireDebtAndColl::default());
        };
        let pending_coll = self.rewards.pending_coll(position)?;
        let pending_debt = self.rewards.pending_debt(position)?;
        Ok(EntireDebtAndColl {
            debt: safe_add(position.debt, pending_debt)?,
            coll: safe_add(position.coll, pending_coll)?,
            pending_debt,
            pending_coll,
        })
    }
}

impl NominalRatioSource for PositionBook {
    fn nominal_icr(&self, id: &Address) -> XusdResult<u128> {
        let entire = self.entire_debt_and_coll(id)?;
        compute_nominal_cr(entire.coll, entire.debt)
    }
}

// ============ Domain State ============

/// Complete state of one collateral domain
#[derive(Debug, Clone, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct DomainState<B> {
    id: DomainId,
    pub(crate) params: RiskParams,
    pub(crate) book: PositionBook,
    /// Dense array of active owners, `Position::array_index` points into it
    pub(crate) owners: Vec<Address>,
    pub(crate) sorted: SortedPositions,
    pub(crate) active_pool: PoolLedger,
    pub(crate) default_pool: PoolLedger,
    pub(crate) surplus: CollSurplusPool,
    pub(crate) fees: BaseRate,
    pub(crate) buffer: B,
}

impl<B: LiquidityBuffer> DomainState<B> {
    /// Create an empty domain after validating its parameters
    pub fn new(id: DomainId, params: RiskParams, buffer: B) -> XusdResult<Self> {
        params.validate()?;
        Ok(Self {
            id,
            params,
            book: PositionBook::default(),
            owners: Vec::new(),
            sorted: SortedPositions::default(),
            active_pool: PoolLedger::new(),
            default_pool: PoolLedger::new(),
            surplus: CollSurplusPool::new(),
            fees: BaseRate::new(),
            buffer,
        })
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn rewards(&self) -> &RewardState {
        &self.book.rewards
    }

    pub fn sorted(&self) -> &SortedPositions {
        &self.sorted
    }

    pub fn active_pool(&self) -> &PoolLedger {
        &self.active_pool
    }

    pub fn default_pool(&self) -> &PoolLedger {
        &self.default_pool
    }

    pub fn surplus(&self) -> &CollSurplusPool {
        &self.surplus
    }

    pub fn fees(&self) -> &BaseRate {
        &self.fees
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub fn owners_count(&self) -> usize {
        self.owners.len()
    }

    pub fn owner_at(&self, index: usize) -> Option<Address> {
        self.owners.get(index).copied()
    }

    // ============ System Views ============

    pub fn entire_system_coll(&self) -> XusdResult<u64> {
        safe_add(self.active_pool.coll, self.default_pool.coll)
    }

    pub fn entire_system_debt(&self) -> XusdResult<u64> {
        safe_add(self.active_pool.debt, self.default_pool.debt)
    }

    /// Total collateral ratio at `price`
    pub fn tcr(&self, price: u64) -> XusdResult<u128> {
        compute_cr(self.entire_system_coll()?, self.entire_system_debt()?, price)
    }

    pub fn check_recovery_mode(&self, price: u64) -> XusdResult<bool> {
        Ok(is_recovery_mode(self.tcr(price)?, self.params.ccr))
    }

    /// Individual collateral ratio including pending rewards
    pub fn current_icr(&self, owner: &Address, price: u64) -> XusdResult<u128> {
        let entire = self.book.entire_debt_and_coll(owner)?;
        compute_cr(entire.coll, entire.debt, price)
    }

    pub fn nominal_icr(&self, owner: &Address) -> XusdResult<u128> {
        self.book.nominal_icr(owner)
    }

    // ============ Reward Sync ============

    /// Fold pending rewards into the position and move them from the default to the active pool
    pub(crate) fn apply_pending_rewards(&mut self, owner: &Address, events: &mut EventLog) -> XusdResult<()> {
        let position = *self.book.active(owner)?;
        if !self.book.rewards.has_pending(&position) {
            return Ok(());
        }

        // Rounding can leave the default pool a unit short of the sum of pending rewards
        let pending_coll = self.book.rewards.pending_coll(&position)?.min(self.default_pool.coll);
        let pending_debt = self.book.rewards.pending_debt(&position)?.min(self.default_pool.debt);

        let entry = self.book.active_mut(owner)?;
        entry.coll = safe_add(entry.coll, pending_coll)?;
        entry.debt = safe_add(entry.debt, pending_debt)?;
        let updated = *entry;
        self.update_reward_snapshot(owner)?;

        self.default_pool.move_to(&mut self.active_pool, pending_coll, pending_debt)?;

        events.emit(XusdEvent::PositionUpdated {
            domain: self.id,
            owner: *owner,
            debt: updated.debt,
            coll: updated.coll,
            stake: updated.stake,
            operation: PositionOperation::ApplyPendingRewards,
        });
        Ok(())
    }

    /// Point the position's snapshot at the current L-terms
    fn update_reward_snapshot(&mut self, owner: &Address) -> XusdResult<()> {
        let snapshot = self.book.rewards.snapshot();
        self.book.active_mut(owner)?.snapshot = snapshot;
        Ok(())
    }

    /// Recompute the stake from the current collateral and adjust the total
    pub(crate) fn update_stake_and_total_stakes(&mut self, owner: &Address, events: &mut EventLog) -> XusdResult<u64> {
        let position = *self.book.active(owner)?;
        let new_stake = self.book.rewards.compute_stake(position.coll)?;

        self.book.rewards.remove_stake(position.stake)?;
        self.book.rewards.add_stake(new_stake)?;
        self.book.active_mut(owner)?.stake = new_stake;

        events.emit(XusdEvent::TotalStakesUpdated {
            domain: self.id,
            total_stakes: self.book.rewards.total_stakes,
        });
        Ok(new_stake)
    }

    pub(crate) fn remove_stake(&mut self, owner: &Address) -> XusdResult<()> {
        let entry = self.book.active_mut(owner)?;
        let stake = entry.stake;
        entry.stake = 0;
        self.book.rewards.remove_stake(stake)
    }

    /// Overwrite collateral and debt of an active position
    pub(crate) fn set_position_amounts(&mut self, owner: &Address, coll: u64, debt: u64) -> XusdResult<()> {
        let entry = self.book.active_mut(owner)?;
        entry.coll = coll;
        entry.debt = debt;
        Ok(())
    }

    // ============ Lifecycle ============

    /// Create an active position and append it to the owners array
    ///
    /// The caller inserts it into the index once stake and amounts are final.
    pub(crate) fn activate(&mut self, owner: &Address, coll: u64, debt: u64) -> XusdResult<()> {
        if self.book.get(owner).is_some_and(|p| p.status.is_active()) {
            return Err(XusdError::PositionAlreadyActive { owner: *owner });
        }
        let array_index = self.owners.len() as u64;
        self.owners.push(*owner);
        self.book.positions.insert(
            *owner,
            Position {
                debt,
                coll,
                stake: 0,
                status: PositionStatus::Active,
                array_index,
                snapshot: self.book.rewards.snapshot(),
            },
        );
        Ok(())
    }

    /// Mark the position closed and unlink it from the index and the owners array
    ///
    /// The stake must already have been removed.
    pub(crate) fn close(&mut self, owner: &Address, status: PositionStatus) -> XusdResult<()> {
        if self.owners.len() <= 1 {
            return Err(XusdError::OnlyOnePositionInSystem);
        }
        let entry = self.book.active_mut(owner)?;
        let index = entry.array_index as usize;
        *entry = Position {
            status,
            snapshot: RewardSnapshot::default(),
            ..Position::default()
        };

        self.remove_owner(owner, index)?;
        self.sorted.remove(owner)
    }

    /// Swap the last owner into the freed slot
    fn remove_owner(&mut self, owner: &Address, index: usize) -> XusdResult<()> {
        if self.owners.get(index) != Some(owner) {
            return Err(XusdError::InvalidTarget { owner: *owner });
        }
        self.owners.swap_remove(index);
        if let Some(moved) = self.owners.get(index).copied() {
            if let Some(position) = self.book.positions.get_mut(&moved) {
                position.array_index = index as u64;
            }
        }
        Ok(())
    }

    /// Insert or move `owner` in the index at its current nominal ratio
    pub(crate) fn reposition(
        &mut self,
        owner: &Address,
        upper_hint: Option<Address>,
        lower_hint: Option<Address>,
        events: &mut EventLog,
    ) -> XusdResult<()> {
        let nicr = self.book.nominal_icr(owner)?;
        if self.sorted.contains(owner) {
            self.sorted.re_insert(*owner, nicr, upper_hint, lower_hint, &self.book)?;
        } else {
            self.sorted.insert(*owner, nicr, upper_hint, lower_hint, &self.book)?;
        }
        events.emit(XusdEvent::PositionIndexUpdated {
            domain: self.id,
            owner: *owner,
            nicr,
        });
        Ok(())
    }

    pub(crate) fn emit_position_updated(
        &self,
        owner: &Address,
        operation: PositionOperation,
        events: &mut EventLog,
    ) {
        let position = self.book.get(owner).copied().unwrap_or_default();
        events.emit(XusdEvent::PositionUpdated {
            domain: self.id,
            owner: *owner,
            debt: position.debt,
            coll: position.coll,
            stake: position.stake,
            operation,
        });
    }

    // ============ Redistribution ============

    /// Spread collateral and debt over the remaining stakes and park them in the default pool
    pub(crate) fn redistribute(&mut self, coll: u64, debt: u64, events: &mut EventLog) -> XusdResult<()> {
        if debt == 0 {
            return Ok(());
        }
        self.book.rewards.redistribute(coll, debt)?;
        self.active_pool.move_to(&mut self.default_pool, coll, debt)?;

        tracing::debug!(coll, debt, l_coll = %self.book.rewards.l_coll, "redistributed");
        events.emit(XusdEvent::LTermsUpdated {
            domain: self.id,
            l_coll: self.book.rewards.l_coll,
            l_debt: self.book.rewards.l_debt,
        });
        Ok(())
    }

    /// Snapshot stakes and system collateral after a liquidation
    pub(crate) fn update_system_snapshots(&mut self, events: &mut EventLog) -> XusdResult<()> {
        let total_coll = self.entire_system_coll()?;
        self.book.rewards.update_system_snapshots(total_coll);
        events.emit(XusdEvent::SystemSnapshotsUpdated {
            domain: self.id,
            total_stakes_snapshot: self.book.rewards.total_stakes_snapshot,
            total_coll_snapshot: self.book.rewards.total_coll_snapshot,
        });
        Ok(())
    }

    /// Move collateral from the active pool to `owner`'s surplus balance
    pub(crate) fn record_surplus(&mut self, owner: &Address, amount: u64, events: &mut EventLog) -> XusdResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.active_pool.debit_collateral(amount)?;
        let balance = self.surplus.record_surplus(owner, amount)?;
        events.emit(XusdEvent::CollSurplusAccounted {
            domain: self.id,
            owner: *owner,
            amount,
            balance,
        });
        Ok(())
    }
}
