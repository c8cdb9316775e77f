//! Pool ledgers
//!
//! Custodial bookkeeping for one domain. The active pool backs open positions,
//! the default pool holds redistributed collateral and debt until positions
//! sync their pending rewards, and the surplus pool keeps collateral owed to
//! owners whose positions were closed with value left over.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{XusdError, XusdResult};
use crate::types::Address;
use crate::BTreeMap;

// ============ Active / Default Pool ============

/// Collateral and debt held by one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolLedger {
    /// Collateral in base units
    pub coll: u64,
    /// Debt in stablecoin base units
    pub debt: u64,
}

impl PoolLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit_collateral(&mut self, amount: u64) -> XusdResult<()> {
        self.coll = self.coll.checked_add(amount).ok_or(XusdError::Overflow)?;
        Ok(())
    }

    pub fn debit_collateral(&mut self, amount: u64) -> XusdResult<()> {
        self.coll = self
            .coll
            .checked_sub(amount)
            .ok_or(XusdError::InsufficientPoolBalance { available: self.coll, required: amount })?;
        Ok(())
    }

    pub fn credit_debt(&mut self, amount: u64) -> XusdResult<()> {
        self.debt = self.debt.checked_add(amount).ok_or(XusdError::Overflow)?;
        Ok(())
    }

    pub fn debit_debt(&mut self, amount: u64) -> XusdResult<()> {
        self.debt = self
            .debt
            .checked_sub(amount)
            .ok_or(XusdError::InsufficientPoolBalance { available: self.debt, required: amount })?;
        Ok(())
    }

    /// Move collateral and debt from this pool into `to`
    pub fn move_to(&mut self, to: &mut PoolLedger, coll: u64, debt: u64) -> XusdResult<()> {
        self.debit_collateral(coll)?;
        self.debit_debt(debt)?;
        to.credit_collateral(coll)?;
        to.credit_debt(debt)
    }

    /// Check if there's anything in the pool
    pub fn has_pending(&self) -> bool {
        self.debt > 0 || self.coll > 0
    }
}

// ============ Surplus Pool ============

/// Claimable collateral per owner
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CollSurplusPool {
    /// Total collateral held
    pub total_coll: u64,
    balances: BTreeMap<Address, u64>,
}

impl CollSurplusPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record surplus for `owner`, returning the new claimable balance
    pub fn record_surplus(&mut self, owner: &Address, amount: u64) -> XusdResult<u64> {
        let balance = self.balances.entry(*owner).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(XusdError::Overflow)?;
        self.total_coll = self.total_coll.checked_add(amount).ok_or(XusdError::Overflow)?;
        Ok(*balance)
    }

    /// Claimable balance of `owner`
    pub fn balance_of(&self, owner: &Address) -> u64 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Remove and return the owner's whole balance
    pub fn claim(&mut self, owner: &Address) -> XusdResult<u64> {
        let amount = self
            .balances
            .remove(owner)
            .filter(|amount| *amount > 0)
            .ok_or(XusdError::SurplusNotFound { owner: *owner })?;
        self.total_coll = self.total_coll.checked_sub(amount).ok_or(XusdError::Underflow)?;
        Ok(amount)
    }
}
