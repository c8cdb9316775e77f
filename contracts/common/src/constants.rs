//! Protocol Constants
//!
//! All magic numbers and default configuration values for the xUSD ledger.
//! Per-domain values that governance may tune live in [`crate::params::RiskParams`];
//! the constants here are their defaults and safety bounds.
//!
//! # Network Configuration
//!
//! Use feature flags to compile for different networks:
//! - `mainnet` - Production values (higher minimums, full gas compensation)
//! - Default (no feature) - Testnet values (lower minimums for testing)
//!
//! ```toml
//! # For mainnet deployment:
//! xusd-common = { path = "...", features = ["mainnet"] }
//! ```

/// Token Metadata
pub mod token {
    /// Token name
    pub const NAME: &str = "xUSD";
    /// Token symbol
    pub const SYMBOL: &str = "xUSD";
    /// Decimal places, shared by the stablecoin, collateral amounts and prices
    pub const DECIMALS: u8 = 8;
    /// One unit with decimals (1 xUSD = 100_000_000 base units)
    pub const ONE: u64 = 100_000_000;
}

/// Precision constants
pub mod precision {
    /// Fixed-point unit for ratios, fee rates and reward accumulators
    pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000; // 1e18

    /// Fixed-point unit for the nominal collateral ratio used as the index key
    pub const NICR_PRECISION: u128 = 100_000_000_000_000_000_000; // 1e20

    /// Price scale (prices carry 8 decimals)
    pub const PRICE_PRECISION: u128 = super::token::ONE as u128;
}

/// Collateralization Ratios (fixed-point, 1e18 = 100%)
pub mod ratios {
    /// 100% collateralization
    pub const ONE_HUNDRED_PCT: u128 = 1_000_000_000_000_000_000;

    /// Minimum Collateral Ratio - below this, a position can be liquidated
    pub const MCR: u128 = 1_100_000_000_000_000_000; // 110%

    /// Critical Collateral Ratio - the domain enters Recovery Mode below this
    pub const CCR: u128 = 1_500_000_000_000_000_000; // 150%
}

/// Debt Limits
///
/// Values differ between mainnet and testnet to allow easier testing.
pub mod limits {
    use super::token::ONE;

    /// Minimum net debt (debt excluding the gas compensation reserve)
    /// - Mainnet: 1,800 xUSD
    /// - Testnet: 10 xUSD
    #[cfg(feature = "mainnet")]
    pub const MIN_NET_DEBT: u64 = 1_800 * ONE;
    #[cfg(not(feature = "mainnet"))]
    pub const MIN_NET_DEBT: u64 = 10 * ONE;

    /// Helper to check if running in mainnet mode
    #[cfg(feature = "mainnet")]
    pub const IS_MAINNET: bool = true;
    #[cfg(not(feature = "mainnet"))]
    pub const IS_MAINNET: bool = false;
}

/// Gas Pool Configuration
pub mod gas_pool {
    use super::token::ONE;

    /// Stablecoin reserve minted to the gas pool at opening and paid to liquidators
    /// - Mainnet: 200 xUSD
    /// - Testnet: 2 xUSD
    #[cfg(feature = "mainnet")]
    pub const GAS_COMPENSATION: u64 = 200 * ONE;
    #[cfg(not(feature = "mainnet"))]
    pub const GAS_COMPENSATION: u64 = 2 * ONE;
}

/// Liquidation Configuration
pub mod liquidation {
    /// Collateral share paid to the liquidator: `coll / PERCENT_DIVISOR` (0.5%)
    pub const PERCENT_DIVISOR: u64 = 200;
}

/// Fee Configuration (fixed-point, 1e18 = 100%)
pub mod fees {
    /// Minimum borrowing fee (0.5%)
    pub const BORROWING_FEE_FLOOR: u128 = 5_000_000_000_000_000;

    /// Maximum borrowing fee (5%)
    pub const MAX_BORROWING_FEE: u128 = 50_000_000_000_000_000;

    /// Redemption fee floor (0.5%)
    pub const REDEMPTION_FEE_FLOOR: u128 = 5_000_000_000_000_000;

    /// Divisor applied to the redeemed fraction before it is added to the base rate
    pub const BETA: u128 = 2;

    /// Per-minute decay factor giving the base rate a 12 hour half-life
    pub const MINUTE_DECAY_FACTOR: u128 = 999_037_758_833_783_000;
}

/// Stability Pool Configuration
pub mod stability_pool {
    /// Product `P` is rescaled by this factor when it would drop below it
    pub const SCALE_FACTOR: u128 = 1_000_000_000; // 1e9

    /// Deposits compounded below `initial / DUST_DIVISOR` are treated as empty
    pub const DUST_DIVISOR: u64 = 1_000_000_000;
}

/// Oracle Configuration
pub mod oracle {
    /// Default maximum allowed price deviation per update (5%)
    pub const MAX_PRICE_DEVIATION_BPS: u64 = 500;

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u64 = 10_000;
}

/// Time-related constants
pub mod time {
    /// Seconds in one minute (the base rate decays in whole minutes)
    pub const SECONDS_IN_ONE_MINUTE: u64 = 60;

    /// Upper bound on minutes fed to the decay exponentiation (~1000 years)
    pub const MAX_DECAY_MINUTES: u64 = 525_600_000;
}

/// Well-known ledger accounts
pub mod accounts {
    use crate::types::Address;

    /// Holds every open position's gas compensation reserve
    pub const GAS_POOL: Address = [0x6a; 32];

    /// Receives the collateral fee charged on redemptions
    pub const FEE_RECIPIENT: Address = [0xfe; 32];
}

/// Safety bounds for per-domain risk parameters
pub mod safety {
    use super::token::ONE;

    /// MCR / CCR lower bound (101%)
    pub const RATIO_MIN: u128 = 1_010_000_000_000_000_000;
    /// MCR / CCR upper bound (1000%)
    pub const RATIO_MAX: u128 = 10_000_000_000_000_000_000;

    /// Percent divisor lower bound (50%)
    pub const PERCENT_DIVISOR_MIN: u64 = 2;
    /// Percent divisor upper bound (0.5%)
    pub const PERCENT_DIVISOR_MAX: u64 = 200;

    /// Gas compensation lower bound
    pub const GAS_COMPENSATION_MIN: u64 = ONE;
    /// Gas compensation upper bound
    pub const GAS_COMPENSATION_MAX: u64 = 400 * ONE;

    /// Minimum net debt upper bound
    pub const MIN_NET_DEBT_MAX: u64 = 1_800 * ONE;

    /// Borrowing floor / max borrowing fee upper bound (10%)
    pub const BORROWING_FEE_MAX: u128 = 100_000_000_000_000_000;

    /// Redemption fee floor lower bound (0.1%)
    pub const REDEMPTION_FEE_FLOOR_MIN: u128 = 1_000_000_000_000_000;
    /// Redemption fee floor upper bound (10%)
    pub const REDEMPTION_FEE_FLOOR_MAX: u128 = 100_000_000_000_000_000;
}
