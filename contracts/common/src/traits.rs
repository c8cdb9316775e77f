//! Collaborator interfaces consumed by the position manager
//!
//! The engine talks to the price feed, the stablecoin ledger and the
//! liquidity buffer only through these traits. Implementations live in the
//! `xusd-price-oracle`, `xusd-token` and `xusd-stability-pool` crates.

use crate::errors::XusdResult;
use crate::types::{Address, DomainId};

/// Supplies the current collateral price of a domain
pub trait PriceFeed {
    /// Stablecoin per collateral unit, 8 decimals
    fn current_price(&self, domain: &DomainId) -> XusdResult<u64>;
}

/// Stablecoin balance bookkeeping
pub trait StableToken {
    fn balance_of(&self, account: &Address) -> u64;

    fn total_supply(&self) -> u64;

    fn mint(&mut self, to: &Address, amount: u64) -> XusdResult<()>;

    fn burn(&mut self, from: &Address, amount: u64) -> XusdResult<()>;

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> XusdResult<()>;
}

/// Pooled stablecoin deposits that absorb liquidated debt
pub trait LiquidityBuffer {
    /// Stablecoin available for offsetting
    fn total_deposits(&self) -> u64;

    /// Ledger account holding the pooled stablecoin
    fn deposit_account(&self) -> Address;

    /// Cancel `debt` against deposits and hand `coll` to depositors pro-rata
    ///
    /// The caller burns the offset stablecoin from `deposit_account`.
    fn offset(&mut self, debt: u64, coll: u64) -> XusdResult<()>;

    /// Hook fired after a liquidation while deposits are non-zero
    fn trigger_issuance(&mut self, _timestamp: u64) {}
}
