//! Protocol Events for the xUSD ledger
//!
//! Events are emitted during entry point execution and committed together
//! with the state change that produced them. They can be indexed off-chain
//! or inspected in tests.

use crate::types::{Address, DomainId, PositionOperation};
use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Position Events (0x01 - 0x1F)
    PositionUpdated = 0x01,
    PositionLiquidated = 0x02,
    PositionIndexUpdated = 0x03,

    // Stability Pool Events (0x20 - 0x3F)
    StabilityDeposit = 0x20,
    StabilityWithdrawal = 0x21,
    CollateralGainWithdrawn = 0x22,
    LiquidationOffset = 0x23,

    // Token Events (0x40 - 0x5F)
    TokenTransfer = 0x40,
    TokenMint = 0x41,
    TokenBurn = 0x42,

    // Oracle Events (0x60 - 0x7F)
    PriceUpdated = 0x60,
    OracleOperatorChanged = 0x61,

    // Engine Events (0x80 - 0x9F)
    Liquidation = 0x80,
    Redemption = 0x81,
    LTermsUpdated = 0x82,
    SystemSnapshotsUpdated = 0x83,
    TotalStakesUpdated = 0x84,
    BaseRateUpdated = 0x85,
    LastFeeOpTimeUpdated = 0x86,
    CollSurplusAccounted = 0x87,
    CollSurplusClaimed = 0x88,
    DomainRegistered = 0x89,
}

/// Main event enum containing all possible ledger events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum XusdEvent {
    // ============ Position Events ============

    /// Emitted whenever a position's raw state changes
    PositionUpdated {
        domain: DomainId,
        owner: Address,
        debt: u64,
        coll: u64,
        stake: u64,
        operation: PositionOperation,
    },

    /// Emitted when a position is closed by liquidation
    PositionLiquidated {
        domain: DomainId,
        owner: Address,
        debt: u64,
        coll: u64,
        operation: PositionOperation,
    },

    /// Emitted when a position's node moves in the ordered index
    PositionIndexUpdated {
        domain: DomainId,
        owner: Address,
        nicr: u128,
    },

    // ============ Stability Pool Events ============

    /// Emitted when stablecoin is deposited to the stability pool
    StabilityDeposit {
        depositor: Address,
        amount: u64,
        new_deposit: u64,
        pool_total: u64,
    },

    /// Emitted when stablecoin is withdrawn from the stability pool
    StabilityWithdrawal {
        depositor: Address,
        amount: u64,
        remaining_deposit: u64,
        pool_total: u64,
    },

    /// Emitted when a depositor's collateral gain is paid out
    CollateralGainWithdrawn {
        depositor: Address,
        collateral: u64,
        debt_loss: u64,
    },

    /// Emitted when liquidated debt is offset against the pool
    LiquidationOffset {
        debt_offset: u64,
        collateral_added: u64,
        new_product: u128,
        epoch: u64,
        scale: u64,
    },

    // ============ Token Events ============

    /// Emitted on stablecoin transfer
    TokenTransfer { from: Address, to: Address, amount: u64 },

    /// Emitted when stablecoin is minted
    TokenMint { to: Address, amount: u64, new_supply: u64 },

    /// Emitted when stablecoin is burned
    TokenBurn { from: Address, amount: u64, new_supply: u64 },

    // ============ Oracle Events ============

    /// Emitted when a domain price is updated
    PriceUpdated {
        domain: DomainId,
        old_price: u64,
        new_price: u64,
        timestamp: u64,
    },

    /// Emitted when the oracle operator changes
    OracleOperatorChanged {
        old_operator: Address,
        new_operator: Address,
    },

    // ============ Engine Events ============

    /// Aggregate of one liquidation entry point call
    Liquidation {
        domain: DomainId,
        liquidator: Address,
        liquidated_debt: u64,
        liquidated_coll: u64,
        coll_gas_compensation: u64,
        debt_gas_compensation: u64,
        timestamp: u64,
    },

    /// Aggregate of one redemption entry point call
    Redemption {
        domain: DomainId,
        redeemer: Address,
        attempted_amount: u64,
        actual_amount: u64,
        coll_sent: u64,
        coll_fee: u64,
        timestamp: u64,
    },

    /// Reward accumulators after a redistribution
    LTermsUpdated {
        domain: DomainId,
        l_coll: u128,
        l_debt: u128,
    },

    /// Global stake/collateral snapshots after a liquidation
    SystemSnapshotsUpdated {
        domain: DomainId,
        total_stakes_snapshot: u64,
        total_coll_snapshot: u64,
    },

    /// Sum of active stakes changed
    TotalStakesUpdated { domain: DomainId, total_stakes: u64 },

    /// Base rate changed
    BaseRateUpdated { domain: DomainId, base_rate: u128 },

    /// Last fee operation time advanced
    LastFeeOpTimeUpdated { domain: DomainId, timestamp: u64 },

    /// Collateral surplus recorded for an owner
    CollSurplusAccounted {
        domain: DomainId,
        owner: Address,
        amount: u64,
        balance: u64,
    },

    /// Collateral surplus withdrawn by an owner
    CollSurplusClaimed {
        domain: DomainId,
        owner: Address,
        amount: u64,
    },

    /// New accounting domain registered
    DomainRegistered { domain: DomainId },
}

impl XusdEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PositionUpdated { .. } => EventType::PositionUpdated,
            Self::PositionLiquidated { .. } => EventType::PositionLiquidated,
            Self::PositionIndexUpdated { .. } => EventType::PositionIndexUpdated,
            Self::StabilityDeposit { .. } => EventType::StabilityDeposit,
            Self::StabilityWithdrawal { .. } => EventType::StabilityWithdrawal,
            Self::CollateralGainWithdrawn { .. } => EventType::CollateralGainWithdrawn,
            Self::LiquidationOffset { .. } => EventType::LiquidationOffset,
            Self::TokenTransfer { .. } => EventType::TokenTransfer,
            Self::TokenMint { .. } => EventType::TokenMint,
            Self::TokenBurn { .. } => EventType::TokenBurn,
            Self::PriceUpdated { .. } => EventType::PriceUpdated,
            Self::OracleOperatorChanged { .. } => EventType::OracleOperatorChanged,
            Self::Liquidation { .. } => EventType::Liquidation,
            Self::Redemption { .. } => EventType::Redemption,
            Self::LTermsUpdated { .. } => EventType::LTermsUpdated,
            Self::SystemSnapshotsUpdated { .. } => EventType::SystemSnapshotsUpdated,
            Self::TotalStakesUpdated { .. } => EventType::TotalStakesUpdated,
            Self::BaseRateUpdated { .. } => EventType::BaseRateUpdated,
            Self::LastFeeOpTimeUpdated { .. } => EventType::LastFeeOpTimeUpdated,
            Self::CollSurplusAccounted { .. } => EventType::CollSurplusAccounted,
            Self::CollSurplusClaimed { .. } => EventType::CollSurplusClaimed,
            Self::DomainRegistered { .. } => EventType::DomainRegistered,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting multiple events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<XusdEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: XusdEvent) {
        self.events.push(event);
    }

    /// Append every event of another log, preserving order
    pub fn extend(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Get all events
    pub fn events(&self) -> &[XusdEvent] {
        &self.events
    }

    /// Take ownership of all events
    pub fn into_events(self) -> Vec<XusdEvent> {
        self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&XusdEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
