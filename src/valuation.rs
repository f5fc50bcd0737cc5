//! Converts positions and reserves into a consistent raw-token1 unit of
//! account. All pool-facing math stays in integers; floats appear only at
//! the display boundary.

use ethnum::U256;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::libraries::{
    amount_delta::{get_amount_0_delta, get_amount_1_delta, AmountDeltaError},
    constants::Q96,
    full_math::{mul_div, FullMathError},
    safe_cast::{big_uint_to_u256, u256_to_big_uint},
    tick_math,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ValuationError {
    Amounts(AmountDeltaError),
    Math(FullMathError),
}

/// Token amounts a position of `liquidity` over `[tick_lower, tick_upper)`
/// unwinds to at sqrt price `s` (rounded down, the withdrawable amounts).
pub fn position_amounts(
    liquidity: u128,
    tick_lower: i32,
    tick_upper: i32,
    sqrt_price_x96: U256,
) -> Result<(U256, U256), ValuationError> {
    let sqrt_lower = tick_math::get_sqrt_ratio_at_tick(tick_lower);
    let sqrt_upper = tick_math::get_sqrt_ratio_at_tick(tick_upper);

    if sqrt_price_x96 <= sqrt_lower {
        let amount0 = get_amount_0_delta(sqrt_lower, sqrt_upper, liquidity, false)
            .map_err(ValuationError::Amounts)?;
        Ok((amount0, U256::ZERO))
    } else if sqrt_price_x96 < sqrt_upper {
        let amount0 = get_amount_0_delta(sqrt_price_x96, sqrt_upper, liquidity, false)
            .map_err(ValuationError::Amounts)?;
        let amount1 = get_amount_1_delta(sqrt_lower, sqrt_price_x96, liquidity, false)
            .map_err(ValuationError::Amounts)?;
        Ok((amount0, amount1))
    } else {
        let amount1 = get_amount_1_delta(sqrt_lower, sqrt_upper, liquidity, false)
            .map_err(ValuationError::Amounts)?;
        Ok((U256::ZERO, amount1))
    }
}

/// Values `(amount0, amount1)` in raw token1 units at sqrt price `s`:
/// amount1 + amount0 * (s / 2^96)^2, floor-rounded.
pub fn quote_value(
    amount0: U256,
    amount1: U256,
    sqrt_price_x96: U256,
) -> Result<U256, ValuationError> {
    let scaled = mul_div(amount0, sqrt_price_x96, *Q96).map_err(ValuationError::Math)?;
    let amount0_in_quote =
        mul_div(scaled, sqrt_price_x96, *Q96).map_err(ValuationError::Math)?;
    Ok(amount1 + amount0_in_quote)
}

/// The amount of token0 worth `quote` raw token1 units at sqrt price `s`:
/// quote * 2^192 / s^2, floor-rounded.
pub fn quote_to_token0(quote: U256, sqrt_price_x96: U256) -> Result<U256, ValuationError> {
    let scaled = mul_div(quote, *Q96, sqrt_price_x96).map_err(ValuationError::Math)?;
    mul_div(scaled, *Q96, sqrt_price_x96).map_err(ValuationError::Math)
}

/// Impermanent loss versus holding the initial token mixture, as a fraction
/// (negative means the LP is behind HODL). `lp_value` excludes earned fees.
pub fn impermanent_loss(lp_value_excl_fees: f64, hodl_value: f64) -> f64 {
    if hodl_value <= 0.0 {
        return 0.0;
    }
    (lp_value_excl_fees - hodl_value) / hodl_value
}

/// Raw price (token1 per token0) carried by a sqrt price, as f64. Display
/// boundary only.
pub fn sqrt_price_to_raw_price(sqrt_price_x96: U256) -> f64 {
    let q96 = 2_f64.powi(96);
    let s = u256_to_big_uint(sqrt_price_x96).to_f64().unwrap_or(0.0) / q96;
    s * s
}

/// Human display price: raw price adjusted for token decimals.
pub fn sqrt_price_to_display_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    sqrt_price_to_raw_price(sqrt_price_x96)
        * 10_f64.powi(decimals0 as i32 - decimals1 as i32)
}

/// Inverse display bridge: a display price to the greatest tick at or below
/// it. Used by strategies translating indicator levels into range bounds;
/// the f64 square root never feeds pool math directly.
pub fn display_price_to_tick(price: f64, decimals0: u8, decimals1: u8) -> Option<i32> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let raw = price * 10_f64.powi(decimals1 as i32 - decimals0 as i32);
    let sqrt_price_x96 = raw.sqrt() * 2_f64.powi(96);
    let as_u256 = big_uint_to_u256(num_bigint::BigUint::from_f64(sqrt_price_x96)?).ok()?;
    if as_u256 < *crate::libraries::constants::MIN_SQRT_RATIO
        || as_u256 >= *crate::libraries::constants::MAX_SQRT_RATIO
    {
        return None;
    }
    Some(tick_math::get_tick_at_sqrt_ratio(as_u256))
}

/// Lossy conversion of a raw token amount to f64 display units.
pub fn to_display_units(amount: U256, decimals: u8) -> f64 {
    u256_to_big_uint(amount).to_f64().unwrap_or(f64::MAX) / 10_f64.powi(decimals as i32)
}
