//! Fixed-point collateral arithmetic
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Collateral ratios are expressed in whole percent: 100 means reserves must
//! at least equal the minted amount.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from collateral arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Arithmetic overflow computing {operation}")]
    Overflow { operation: &'static str },
}

/// Multiplier applied to reserves so they compare against a percent ratio
pub const PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Check `reserves × 100 < minted × min_ratio_percent`.
///
/// Both sides use checked multiplication; an overflow is reported rather
/// than silently saturating.
pub fn is_undercollateralized(
    reserves: Decimal,
    minted: Decimal,
    min_ratio_percent: Decimal,
) -> Result<bool, NumericError> {
    let lhs = reserves
        .checked_mul(PERCENT)
        .ok_or(NumericError::Overflow { operation: "reserves × 100" })?;
    let rhs = minted
        .checked_mul(min_ratio_percent)
        .ok_or(NumericError::Overflow { operation: "minted × min ratio" })?;
    Ok(lhs < rhs)
}

/// Current collateral ratio in percent, or `None` when nothing is minted.
pub fn collateral_ratio_percent(reserves: Decimal, minted: Decimal) -> Option<Decimal> {
    if minted.is_zero() {
        return None;
    }
    reserves.checked_mul(PERCENT)?.checked_div(minted)
}
