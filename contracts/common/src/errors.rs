//! Error Types for the xUSD ledger
//!
//! Typed errors with a stable machine code per variant. Every entry point
//! either returns `Ok` and commits, or returns one of these and leaves state
//! untouched.

use core::fmt;

use crate::types::{Address, DomainId};

/// Result type alias for xUSD operations
pub type XusdResult<T> = Result<T, XusdError>;

/// Main error enum for all xUSD ledger errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XusdError {
    // ============ Domain Errors ============
    /// No accounting domain registered under this key
    UnknownDomain { domain: DomainId },

    /// A domain with this key already exists
    DomainAlreadyExists { domain: DomainId },

    // ============ Position Errors ============
    /// Position does not exist or is already closed
    InvalidTarget { owner: Address },

    /// Owner already has an active position in this domain
    PositionAlreadyActive { owner: Address },

    /// The last active position of a domain cannot be closed
    OnlyOnePositionInSystem,

    /// Position would be undercollateralized
    Undercollateralized {
        current_ratio: u128,
        required_ratio: u128,
    },

    // ============ Amount Errors ============
    /// Zero amount not allowed
    ZeroAmount,

    /// Amount below minimum threshold
    BelowMinimum { amount: u64, minimum: u64 },

    /// Insufficient balance for operation
    InsufficientBalance { available: u64, requested: u64 },

    // ============ Liquidation Errors ============
    /// No position qualified for liquidation
    NothingToLiquidate,

    /// Batch liquidation called with an empty list
    EmptyBatch,

    // ============ Redemption Errors ============
    /// Domain has no outstanding debt
    ZeroSystemDebt,

    /// Caller holds less stablecoin than requested
    InsufficientCallerBalance { balance: u64, requested: u64 },

    /// Redemptions are blocked while TCR < MCR
    TcrBelowMcr { tcr: u128, mcr: u128 },

    /// Fee percentage exceeds the caller's limit
    FeeExceedsMax { fee_percentage: u128, max_fee_percentage: u128 },

    /// Fee would absorb the whole collateral drawn
    FeeConsumesAllCollateral { fee: u64, collateral_drawn: u64 },

    /// Max fee percentage outside `[floor, 100%]`
    InvalidMaxFeePercentage { max_fee_percentage: u128 },

    /// The redemption walk found nothing to redeem
    UnableToRedeem,

    // ============ Recovery Mode Errors ============
    /// Operation not allowed in Recovery Mode
    RecoveryModeRestriction { operation: RecoveryModeOp },

    /// Operation would push TCR below CCR
    WouldWorsenTcr { current_tcr: u128, new_tcr: u128 },

    // ============ Stability Pool Errors ============
    /// Insufficient balance in a pool ledger
    InsufficientPoolBalance { available: u64, required: u64 },

    /// Deposit not found for user
    DepositNotFound { user: Address },

    // ============ Surplus Errors ============
    /// Owner has no claimable surplus
    SurplusNotFound { owner: Address },

    // ============ Index Errors ============
    /// Ordered index reached its configured capacity
    IndexFull,

    /// Id already present in the ordered index
    AlreadyInIndex { id: Address },

    /// Id missing from the ordered index
    NotInIndex { id: Address },

    /// Nominal ratio must be positive
    InvalidNominalIcr,

    // ============ Authorization Errors ============
    /// Caller is not authorized for this operation
    Unauthorized { expected: Address, actual: Address },

    // ============ Oracle Errors ============
    /// No price has been published for this domain
    OracleNotInitialized,

    /// Oracle price deviation too large
    OraclePriceDeviation {
        old_price: u64,
        new_price: u64,
        max_deviation_bps: u64,
    },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Input Validation Errors ============
    /// Invalid parameter value
    InvalidParameter { param: &'static str, reason: &'static str },
}

/// Operations restricted during Recovery Mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryModeOp {
    /// Withdrawing collateral
    WithdrawCollateral,
    /// Closing a position
    ClosePosition,
}

impl XusdError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownDomain { .. } => "E001_UNKNOWN_DOMAIN",
            Self::DomainAlreadyExists { .. } => "E002_DOMAIN_EXISTS",
            Self::InvalidTarget { .. } => "E003_INVALID_TARGET",
            Self::PositionAlreadyActive { .. } => "E004_POSITION_ACTIVE",
            Self::OnlyOnePositionInSystem => "E005_LAST_POSITION",
            Self::Undercollateralized { .. } => "E006_UNDERCOLLATERALIZED",
            Self::ZeroAmount => "E010_ZERO_AMOUNT",
            Self::BelowMinimum { .. } => "E011_BELOW_MINIMUM",
            Self::InsufficientBalance { .. } => "E012_INSUFFICIENT_BALANCE",
            Self::NothingToLiquidate => "E061_NOTHING_TO_LIQ",
            Self::EmptyBatch => "E062_EMPTY_BATCH",
            Self::ZeroSystemDebt => "E070_ZERO_SYSTEM_DEBT",
            Self::InsufficientCallerBalance { .. } => "E071_CALLER_BALANCE",
            Self::TcrBelowMcr { .. } => "E072_TCR_BELOW_MCR",
            Self::FeeExceedsMax { .. } => "E073_FEE_EXCEEDS_MAX",
            Self::FeeConsumesAllCollateral { .. } => "E074_FEE_EATS_COLL",
            Self::InvalidMaxFeePercentage { .. } => "E075_INVALID_MAX_FEE",
            Self::UnableToRedeem => "E076_UNABLE_TO_REDEEM",
            Self::RecoveryModeRestriction { .. } => "E040_RECOVERY_MODE",
            Self::WouldWorsenTcr { .. } => "E041_WORSEN_TCR",
            Self::InsufficientPoolBalance { .. } => "E050_POOL_INSUFFICIENT",
            Self::DepositNotFound { .. } => "E051_DEPOSIT_NOT_FOUND",
            Self::SurplusNotFound { .. } => "E064_SURPLUS_NOT_FOUND",
            Self::IndexFull => "E090_INDEX_FULL",
            Self::AlreadyInIndex { .. } => "E091_ALREADY_INDEXED",
            Self::NotInIndex { .. } => "E092_NOT_INDEXED",
            Self::InvalidNominalIcr => "E093_INVALID_NICR",
            Self::Unauthorized { .. } => "E020_UNAUTHORIZED",
            Self::OracleNotInitialized => "E032_ORACLE_NOT_INIT",
            Self::OraclePriceDeviation { .. } => "E031_ORACLE_DEVIATION",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
            Self::InvalidParameter { .. } => "E114_INVALID_PARAM",
        }
    }

    /// Returns true if this error is recoverable (caller can fix it)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Undercollateralized { .. } => true,        // Add more collateral
            Self::InsufficientBalance { .. } => true,        // Get more funds
            Self::InsufficientCallerBalance { .. } => true,  // Get more funds
            Self::BelowMinimum { .. } => true,               // Increase amount
            Self::FeeExceedsMax { .. } => true,              // Resubmit with fresh hints
            _ => false,
        }
    }
}

impl fmt::Display for XusdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.code(), self)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for XusdError {}
