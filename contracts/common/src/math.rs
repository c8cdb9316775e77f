//! Mathematical Utilities for the xUSD ledger
//!
//! Checked fixed-point operations and collateral ratio calculations.
//! Amounts are `u64` base units; every product is widened to `u128`.

use crate::constants::{precision, time};
use crate::errors::{XusdError, XusdResult};

/// `DECIMAL_PRECISION / PRICE_PRECISION`, folds the price scale into ratio math
const RATIO_PRICE_FACTOR: u128 = precision::DECIMAL_PRECISION / precision::PRICE_PRECISION;

/// Calculate a collateral ratio (ICR or TCR)
///
/// ratio = collateral * price / debt, as a 1e18 fixed-point value
///
/// # Arguments
/// * `coll` - Collateral in base units
/// * `debt` - Debt in stablecoin base units
/// * `price` - Stablecoin per collateral unit, 8 decimals
///
/// # Returns
/// Ratio where 1e18 = 100%, or `u128::MAX` when there is no debt
pub fn compute_cr(coll: u64, debt: u64, price: u64) -> XusdResult<u128> {
    if debt == 0 {
        return Ok(u128::MAX);
    }

    (coll as u128)
        .checked_mul(price as u128)
        .and_then(|v| v.checked_mul(RATIO_PRICE_FACTOR))
        .ok_or(XusdError::Overflow)?
        .checked_div(debt as u128)
        .ok_or(XusdError::DivisionByZero)
}

/// Calculate the price-independent nominal collateral ratio used to order the index
///
/// nicr = collateral * 1e20 / debt, `u128::MAX` when there is no debt
pub fn compute_nominal_cr(coll: u64, debt: u64) -> XusdResult<u128> {
    if debt == 0 {
        return Ok(u128::MAX);
    }

    (coll as u128)
        .checked_mul(precision::NICR_PRECISION)
        .ok_or(XusdError::Overflow)?
        .checked_div(debt as u128)
        .ok_or(XusdError::DivisionByZero)
}

/// Stablecoin value of a collateral amount at `price`
pub fn collateral_value(coll: u64, price: u64) -> XusdResult<u64> {
    let value = mul_div(coll as u128, price as u128, precision::PRICE_PRECISION)?;
    to_u64(value)
}

/// Collateral amount worth `debt` stablecoin at `price`
pub fn collateral_for_debt(debt: u64, price: u64) -> XusdResult<u64> {
    if price == 0 {
        return Err(XusdError::DivisionByZero);
    }
    let coll = mul_div(debt as u128, precision::PRICE_PRECISION, price as u128)?;
    to_u64(coll)
}

/// Check if a domain is in Recovery Mode
pub fn is_recovery_mode(tcr: u128, ccr: u128) -> bool {
    tcr < ccr
}

// ============ Fixed Point ============

/// Multiply two 1e18 fixed-point values, rounding half up
pub fn dec_mul(x: u128, y: u128) -> XusdResult<u128> {
    let prod = x.checked_mul(y).ok_or(XusdError::Overflow)?;
    prod.checked_add(precision::DECIMAL_PRECISION / 2)
        .map(|v| v / precision::DECIMAL_PRECISION)
        .ok_or(XusdError::Overflow)
}

/// Raise a 1e18 fixed-point base to an integer power by repeated squaring
///
/// The exponent is capped at `MAX_DECAY_MINUTES` so decay stays bounded
/// after very long idle periods.
pub fn dec_pow(base: u128, minutes: u64) -> XusdResult<u128> {
    let mut n = minutes.min(time::MAX_DECAY_MINUTES);
    if n == 0 {
        return Ok(precision::DECIMAL_PRECISION);
    }

    let mut x = base;
    let mut y = precision::DECIMAL_PRECISION;
    while n > 1 {
        if n % 2 == 0 {
            x = dec_mul(x, x)?;
            n /= 2;
        } else {
            y = dec_mul(x, y)?;
            x = dec_mul(x, x)?;
            n = (n - 1) / 2;
        }
    }
    dec_mul(x, y)
}

/// `a * b / c` with checked widening
pub fn mul_div(a: u128, b: u128, c: u128) -> XusdResult<u128> {
    if c == 0 {
        return Err(XusdError::DivisionByZero);
    }
    a.checked_mul(b)
        .map(|v| v / c)
        .ok_or(XusdError::Overflow)
}

/// Narrow a `u128` result back to an amount
pub fn to_u64(value: u128) -> XusdResult<u64> {
    u64::try_from(value).map_err(|_| XusdError::Overflow)
}

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> XusdResult<u64> {
    a.checked_add(b).ok_or(XusdError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> XusdResult<u64> {
    a.checked_sub(b).ok_or(XusdError::Underflow)
}
