//! xUSD Common Library
//!
//! Shared types, constants, and utilities for the xUSD collateralized-debt
//! ledger. The position manager, stability pool, token and price oracle
//! crates all build on this one.
//!
//! ## Contents
//!
//! - **Constants / Params**: protocol defaults and per-domain risk parameters
//! - **Errors**: one typed error enum with stable codes
//! - **Math**: checked fixed-point ratio math, `dec_pow` for fee decay
//! - **Events**: borsh-serializable event log committed with each entry point
//! - **Sorted Positions**: the NICR-ordered index with advisory hints
//! - **Pools**: active, default and surplus ledgers
//! - **Fees**: decaying base rate, redemption and borrowing rates
//! - **Traits**: price feed, stablecoin and liquidity buffer seams
//!
//! This crate is `no_std` compatible when built without the default
//! `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collections for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::{collections::BTreeMap, vec::Vec};
#[cfg(feature = "std")]
pub use std::{collections::BTreeMap, vec::Vec};

pub mod constants;
pub mod errors;
pub mod events;
pub mod fees;
pub mod math;
pub mod params;
pub mod pools;
pub mod sorted_positions;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use errors::*;
pub use events::*;
pub use fees::*;
pub use math::*;
pub use params::*;
pub use pools::*;
pub use sorted_positions::*;
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod proptests;
