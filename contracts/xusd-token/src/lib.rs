//! xUSD Token Ledger
//!
//! Account-balance bookkeeping for the xUSD stablecoin. The position
//! manager mints on borrowing, burns on repayment, redemption and stability
//! pool offsets, and pays gas compensation out of the gas pool account.
//!
//! Supply is conserved: `total_supply` always equals the sum of balances.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use xusd_common::{
    constants::token,
    errors::{XusdError, XusdResult},
    events::{EventLog, XusdEvent},
    traits::StableToken,
    types::Address,
};

// ============ Token State ============

/// Stablecoin balances and supply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenLedger {
    balances: BTreeMap<Address, u64>,
    total_supply: u64,
    #[serde(skip)]
    #[borsh(skip)]
    events: EventLog,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted since creation
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Number of accounts with a non-zero balance
    pub fn holders(&self) -> usize {
        self.balances.len()
    }

    fn credit(&mut self, to: &Address, amount: u64) -> XusdResult<()> {
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(XusdError::Overflow)?;
        Ok(())
    }

    fn debit(&mut self, from: &Address, amount: u64) -> XusdResult<()> {
        let available = self.balance_of(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(XusdError::InsufficientBalance { available, requested: amount })?;
        if remaining == 0 {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, remaining);
        }
        Ok(())
    }
}

impl StableToken for TokenLedger {
    fn balance_of(&self, account: &Address) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> u64 {
        self.total_supply
    }

    fn mint(&mut self, to: &Address, amount: u64) -> XusdResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let new_supply = self.total_supply.checked_add(amount).ok_or(XusdError::Overflow)?;
        self.credit(to, amount)?;
        self.total_supply = new_supply;
        self.events.emit(XusdEvent::TokenMint { to: *to, amount, new_supply });
        Ok(())
    }

    fn burn(&mut self, from: &Address, amount: u64) -> XusdResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(from, amount)?;
        self.total_supply = self.total_supply.checked_sub(amount).ok_or(XusdError::Underflow)?;
        self.events.emit(XusdEvent::TokenBurn {
            from: *from,
            amount,
            new_supply: self.total_supply,
        });
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> XusdResult<()> {
        if amount == 0 || from == to {
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        self.events.emit(XusdEvent::TokenTransfer { from: *from, to: *to, amount });
        Ok(())
    }
}

// ============ Helper Functions ============

/// Get token name
pub fn get_name() -> &'static str {
    token::NAME
}

/// Get token symbol
pub fn get_symbol() -> &'static str {
    token::SYMBOL
}

/// Get token decimals
pub fn get_decimals() -> u8 {
    token::DECIMALS
}

/// Split an amount into whole and fractional parts for display
pub fn format_amount(amount: u64) -> (u64, u64) {
    let whole = amount / token::ONE;
    let fractional = amount % token::ONE;
    (whole, fractional)
}

// ============ Tests ============
