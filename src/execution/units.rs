//! Decimal <-> base-unit conversion

use ethers::types::U256;
use rust_decimal::Decimal;

use crate::error::{AgentflowError, Result};

pub const NATIVE_DECIMALS: u32 = 18;

/// Largest scale a `Decimal` can carry
const MAX_DECIMALS: u32 = 28;

/// Largest integer mantissa a `Decimal` can carry (2^96 - 1)
fn max_mantissa() -> U256 {
    U256::from(u128::MAX >> 32)
}

fn check_decimals(decimals: u32) -> Result<()> {
    if decimals > MAX_DECIMALS {
        return Err(AgentflowError::AmountOutOfRange(format!(
            "{} decimals not representable",
            decimals
        )));
    }
    Ok(())
}

/// Convert a human amount to integer base units, truncating extra precision
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<U256> {
    check_decimals(decimals)?;
    if amount.is_sign_negative() {
        return Err(AgentflowError::AmountOutOfRange(format!("negative amount {}", amount)));
    }
    let mantissa = u128::try_from(amount.mantissa())
        .map_err(|_| AgentflowError::AmountOutOfRange(amount.to_string()))?;
    let mantissa = U256::from(mantissa);
    let scale = amount.scale();

    if decimals >= scale {
        mantissa
            .checked_mul(U256::exp10((decimals - scale) as usize))
            .ok_or_else(|| {
                AgentflowError::AmountOutOfRange(format!("{} overflows at {} decimals", amount, decimals))
            })
    } else {
        Ok(mantissa / U256::exp10((scale - decimals) as usize))
    }
}

/// Convert integer base units to a human amount.
///
/// Amounts wider than a `Decimal` mantissa lose their least significant digits.
pub fn from_base_units(raw: U256, decimals: u32) -> Result<Decimal> {
    check_decimals(decimals)?;
    let limit = max_mantissa();
    let mut value = raw;
    let mut scale = decimals;
    while value > limit && scale > 0 {
        value /= U256::from(10u8);
        scale -= 1;
    }
    if value > limit {
        return Err(AgentflowError::AmountOutOfRange(raw.to_string()));
    }
    let value = i128::try_from(value.as_u128())
        .map_err(|_| AgentflowError::AmountOutOfRange(raw.to_string()))?;
    Decimal::try_from_i128_with_scale(value, scale)
        .map(|d| d.normalize())
        .map_err(|e| AgentflowError::AmountOutOfRange(format!("{}: {}", raw, e)))
}
