//! Position Manager - Liquidation, Redistribution and Redemption Engine for xUSD
//!
//! Keeps the ledger of collateralized debt positions for any number of
//! isolated collateral domains and runs the three operations that keep the
//! stablecoin backed.
//!
//! ## Core Operations
//!
//! - **Liquidate**: close a position below MCR (or below TCR in Recovery Mode),
//!   offsetting its debt against the liquidity buffer and redistributing the rest
//! - **LiquidatePositions**: walk up from the riskiest position, up to `n` candidates
//! - **BatchLiquidate**: apply the same policy to an explicit list
//! - **RedeemCollateral**: swap stablecoin for collateral at face value against
//!   the weakest healthy positions
//! - **Open / Adjust / Close**: borrower hooks that keep stakes, rewards and the
//!   index consistent
//!
//! ## Redistribution Model
//!
//! Debt and collateral that the buffer cannot absorb are spread over all
//! active stakes through the `L_coll` / `L_debt` accumulators in O(1). A
//! position's share is materialized lazily the next time it is touched.
//!
//! ## Atomicity
//!
//! [`PositionManager`] runs every entry point on a working copy of the domain
//! and the stablecoin ledger, committing state and events only on success.

pub mod borrower;
pub mod domain;
pub mod hints;
pub mod liquidation;
pub mod manager;
pub mod redemption;
pub mod rewards;

pub use domain::{DomainState, EntireDebtAndColl, OpContext, PositionBook};
pub use hints::{ApproxHint, RedemptionHints};
pub use liquidation::{capped_offset_vals, offset_and_redistribution_vals, LiquidationOutcome, LiquidationValues};
pub use manager::PositionManager;
pub use redemption::{RedemptionOutcome, RedemptionRequest};
pub use rewards::RewardState;

#[cfg(test)]
mod test_fixtures;

#[cfg(test)]
mod scenario_tests;

#[cfg(test)]
mod proptests;
