//! Price Oracle
//!
//! Collateral price feed for the xUSD position manager, one price per
//! accounting domain. Uses a trusted operator model: only the operator may
//! publish prices and only the admin may replace the operator. An optional
//! deviation guard rejects single updates that move the price too far.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use xusd_common::{
    constants::oracle::BPS_DENOMINATOR,
    errors::{XusdError, XusdResult},
    events::{EventLog, XusdEvent},
    traits::PriceFeed,
    types::{Address, DomainId},
};

// ============ Oracle State ============

/// Last published price of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceData {
    /// Stablecoin per collateral unit, 8 decimals
    pub price: u64,
    /// Publication time (seconds)
    pub timestamp: u64,
}

/// Oracle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceOracle {
    /// Authorized operator (can update prices)
    pub operator: Address,
    /// Admin (can change operator)
    pub admin: Address,
    /// Maximum move per update in basis points, `None` disables the guard
    pub max_deviation_bps: Option<u64>,
    prices: BTreeMap<DomainId, PriceData>,
    #[serde(skip)]
    #[borsh(skip)]
    events: EventLog,
}

impl PriceOracle {
    /// Create an oracle with no prices and no deviation guard
    pub fn new(admin: Address, operator: Address) -> Self {
        Self {
            operator,
            admin,
            max_deviation_bps: None,
            prices: BTreeMap::new(),
            events: EventLog::new(),
        }
    }

    /// Enable the per-update deviation guard
    pub fn with_max_deviation(mut self, max_deviation_bps: u64) -> Self {
        self.max_deviation_bps = Some(max_deviation_bps);
        self
    }

    /// Publish a new price for `domain`
    pub fn update_price(
        &mut self,
        signer: &Address,
        domain: &DomainId,
        new_price: u64,
        timestamp: u64,
    ) -> XusdResult<()> {
        // 1. Only operator can update price
        if *signer != self.operator {
            return Err(XusdError::Unauthorized {
                expected: self.operator,
                actual: *signer,
            });
        }

        // 2. Price must be positive
        if new_price == 0 {
            return Err(XusdError::ZeroAmount);
        }

        // 3. Check price deviation against the previous publication
        let old_price = self.prices.get(domain).map(|p| p.price).unwrap_or(0);
        if let Some(max_deviation_bps) = self.max_deviation_bps {
            if old_price != 0 && calculate_price_deviation(old_price, new_price) > max_deviation_bps {
                return Err(XusdError::OraclePriceDeviation {
                    old_price,
                    new_price,
                    max_deviation_bps,
                });
            }
        }

        self.prices.insert(*domain, PriceData { price: new_price, timestamp });
        self.events.emit(XusdEvent::PriceUpdated {
            domain: *domain,
            old_price,
            new_price,
            timestamp,
        });
        Ok(())
    }

    /// Replace the operator
    pub fn set_operator(&mut self, signer: &Address, new_operator: Address) -> XusdResult<()> {
        if *signer != self.admin {
            return Err(XusdError::Unauthorized {
                expected: self.admin,
                actual: *signer,
            });
        }
        let old_operator = self.operator;
        self.operator = new_operator;
        self.events.emit(XusdEvent::OracleOperatorChanged { old_operator, new_operator });
        Ok(())
    }

    /// Last published price data of `domain`
    pub fn price_data(&self, domain: &DomainId) -> Option<PriceData> {
        self.prices.get(domain).copied()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }
}

impl PriceFeed for PriceOracle {
    fn current_price(&self, domain: &DomainId) -> XusdResult<u64> {
        self.prices
            .get(domain)
            .map(|p| p.price)
            .ok_or(XusdError::OracleNotInitialized)
    }
}

// ============ Helper Functions ============

/// Absolute price move in basis points of the old price
fn calculate_price_deviation(old_price: u64, new_price: u64) -> u64 {
    if old_price == 0 {
        return BPS_DENOMINATOR; // 100% if no previous price
    }

    let diff = old_price.abs_diff(new_price);
    let deviation = (diff as u128 * BPS_DENOMINATOR as u128) / old_price as u128;
    deviation.min(u64::MAX as u128) as u64
}

// ============ Tests ============
