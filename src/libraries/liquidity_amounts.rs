use ethnum::U256;
use std::cmp::min;

use super::{constants::Q96, full_math::mul_div};

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidityAmountsError {
    InvalidPrice,
    Overflow,
}

/// Liquidity received for `amount0` of token0 over a price range:
/// amount0 * (sqrt(upper) * sqrt(lower) / 2^96) / (sqrt(upper) - sqrt(lower)).
pub fn get_liquidity_for_amount0(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    amount0: U256,
) -> Result<u128, LiquidityAmountsError> {
    let (sqrt_lower, sqrt_upper) = sort_prices(sqrt_price_a_x96, sqrt_price_b_x96)?;

    let intermediate =
        mul_div(sqrt_lower, sqrt_upper, *Q96).map_err(|_| LiquidityAmountsError::Overflow)?;
    let liquidity = mul_div(amount0, intermediate, sqrt_upper - sqrt_lower)
        .map_err(|_| LiquidityAmountsError::Overflow)?;

    u128::try_from(liquidity).map_err(|_| LiquidityAmountsError::Overflow)
}

/// Liquidity received for `amount1` of token1 over a price range:
/// amount1 * 2^96 / (sqrt(upper) - sqrt(lower)).
pub fn get_liquidity_for_amount1(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    amount1: U256,
) -> Result<u128, LiquidityAmountsError> {
    let (sqrt_lower, sqrt_upper) = sort_prices(sqrt_price_a_x96, sqrt_price_b_x96)?;

    let liquidity = mul_div(amount1, *Q96, sqrt_upper - sqrt_lower)
        .map_err(|_| LiquidityAmountsError::Overflow)?;

    u128::try_from(liquidity).map_err(|_| LiquidityAmountsError::Overflow)
}

/// Maximum liquidity mintable from both token amounts at the current price.
/// When the current price is inside the range the binding minimum of the two
/// single-token results is returned.
pub fn get_liquidity_for_amounts(
    sqrt_price_x96: U256,
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    amount0: U256,
    amount1: U256,
) -> Result<u128, LiquidityAmountsError> {
    let (sqrt_lower, sqrt_upper) = sort_prices(sqrt_price_a_x96, sqrt_price_b_x96)?;

    if sqrt_price_x96 <= sqrt_lower {
        get_liquidity_for_amount0(sqrt_lower, sqrt_upper, amount0)
    } else if sqrt_price_x96 < sqrt_upper {
        let liquidity0 = get_liquidity_for_amount0(sqrt_price_x96, sqrt_upper, amount0)?;
        let liquidity1 = get_liquidity_for_amount1(sqrt_lower, sqrt_price_x96, amount1)?;
        Ok(min(liquidity0, liquidity1))
    } else {
        get_liquidity_for_amount1(sqrt_lower, sqrt_upper, amount1)
    }
}

fn sort_prices(a: U256, b: U256) -> Result<(U256, U256), LiquidityAmountsError> {
    let (lower, upper) = if a > b { (b, a) } else { (a, b) };
    if lower == upper {
        return Err(LiquidityAmountsError::InvalidPrice);
    }
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libraries::tick_math::get_sqrt_ratio_at_tick;

    #[test]
    fn equal_bounds_are_invalid() {
        let s = get_sqrt_ratio_at_tick(100);
        assert_eq!(
            get_liquidity_for_amounts(s, s, s, U256::from(1_u8), U256::from(1_u8)),
            Err(LiquidityAmountsError::InvalidPrice)
        );
    }

    #[test]
    fn below_range_uses_only_token0() {
        let lower = get_sqrt_ratio_at_tick(60);
        let upper = get_sqrt_ratio_at_tick(600);
        let current = get_sqrt_ratio_at_tick(0);

        let with_both = get_liquidity_for_amounts(
            current,
            lower,
            upper,
            U256::from(1_000_000_u64),
            U256::ZERO,
        )
        .unwrap();
        let token0_only =
            get_liquidity_for_amount0(lower, upper, U256::from(1_000_000_u64)).unwrap();
        assert_eq!(with_both, token0_only);
        assert!(with_both > 0);
    }

    #[test]
    fn above_range_uses_only_token1() {
        let lower = get_sqrt_ratio_at_tick(-600);
        let upper = get_sqrt_ratio_at_tick(-60);
        let current = get_sqrt_ratio_at_tick(0);

        let with_both = get_liquidity_for_amounts(
            current,
            lower,
            upper,
            U256::ZERO,
            U256::from(1_000_000_u64),
        )
        .unwrap();
        let token1_only =
            get_liquidity_for_amount1(lower, upper, U256::from(1_000_000_u64)).unwrap();
        assert_eq!(with_both, token1_only);
        assert!(with_both > 0);
    }

    #[test]
    fn inside_range_takes_binding_minimum() {
        let lower = get_sqrt_ratio_at_tick(-600);
        let upper = get_sqrt_ratio_at_tick(600);
        let current = get_sqrt_ratio_at_tick(0);

        let amount0 = U256::from(1_000_000_u64);
        let amount1 = U256::from(1_000_000_u64);
        let both =
            get_liquidity_for_amounts(current, lower, upper, amount0, amount1).unwrap();
        let liquidity0 = get_liquidity_for_amount0(current, upper, amount0).unwrap();
        let liquidity1 = get_liquidity_for_amount1(lower, current, amount1).unwrap();
        assert_eq!(both, min(liquidity0, liquidity1));
    }
}
