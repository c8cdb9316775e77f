//! Core Types for the xUSD ledger
//!
//! This module defines the data structures shared by the position manager
//! and its collaborators.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// Key of an isolated accounting domain (one per collateral asset)
pub type DomainId = [u8; 32];

/// Derive a domain key from a collateral asset symbol
pub fn derive_domain_id(symbol: &str) -> DomainId {
    let mut hasher = Sha256::new();
    hasher.update(b"xusd-domain:");
    hasher.update(symbol.as_bytes());
    hasher.finalize().into()
}

// ============ Position Types ============

/// Lifecycle status of a position
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum PositionStatus {
    /// Never opened
    #[default]
    NonExistent,
    /// Open and indexed
    Active,
    /// Closed by its owner after repaying
    ClosedByOwner,
    /// Closed by a liquidation
    ClosedByLiquidation,
    /// Closed because a redemption consumed all of its net debt
    ClosedByRedemption,
}

impl PositionStatus {
    /// Whether the position is open
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

/// Accumulator values captured when a position last synced its rewards
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct RewardSnapshot {
    pub l_coll: u128,
    pub l_debt: u128,
}

/// Per-owner position record inside one domain
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct Position {
    /// Debt in stablecoin base units, before pending rewards (includes the gas reserve)
    pub debt: u64,
    /// Collateral in base units, before pending rewards
    pub coll: u64,
    /// Redistribution weight, frozen between modifications
    pub stake: u64,
    /// Current status
    pub status: PositionStatus,
    /// Slot in the dense array of active owners
    pub array_index: u64,
    /// Accumulator snapshot for pending reward computation
    pub snapshot: RewardSnapshot,
}

/// Operation that last touched a position, carried in `PositionUpdated` events
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum PositionOperation {
    ApplyPendingRewards = 0,
    LiquidateInNormalMode = 1,
    LiquidateInRecoveryMode = 2,
    RedeemCollateral = 3,
    OpenPosition = 4,
    AdjustPosition = 5,
    ClosePosition = 6,
}
