use ethnum::U256;

use super::{
    constants::Q96,
    full_math::{div_rounding_up, mul_div, mul_div_rounding_up},
};

#[derive(Debug, Clone, PartialEq)]
pub enum AmountDeltaError {
    InvalidPrice,
    Overflow,
}

pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

/// Amount of token0 covering `liquidity` between two sqrt prices:
/// liquidity * (sqrt(upper) - sqrt(lower)) / (sqrt(upper) * sqrt(lower)).
pub fn get_amount_0_delta(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, AmountDeltaError> {
    let (sqrt_lower, sqrt_upper) = if sqrt_price_a_x96 > sqrt_price_b_x96 {
        (sqrt_price_b_x96, sqrt_price_a_x96)
    } else {
        (sqrt_price_a_x96, sqrt_price_b_x96)
    };

    if sqrt_lower == U256::ZERO {
        return Err(AmountDeltaError::InvalidPrice);
    }

    let numerator1 = U256::from(liquidity) << 96;
    let numerator2 = sqrt_upper - sqrt_lower;

    if round_up {
        let intermediate = mul_div_rounding_up(numerator1, numerator2, sqrt_upper)
            .map_err(|_| AmountDeltaError::Overflow)?;
        Ok(div_rounding_up(intermediate, sqrt_lower))
    } else {
        let intermediate =
            mul_div(numerator1, numerator2, sqrt_upper).map_err(|_| AmountDeltaError::Overflow)?;
        Ok(intermediate / sqrt_lower)
    }
}

/// Amount of token1 covering `liquidity` between two sqrt prices:
/// liquidity * (sqrt(upper) - sqrt(lower)) / 2^96.
pub fn get_amount_1_delta(
    sqrt_price_a_x96: U256,
    sqrt_price_b_x96: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, AmountDeltaError> {
    let numerator = abs_diff(sqrt_price_a_x96, sqrt_price_b_x96);
    let liquidity = U256::from(liquidity);

    let amount1 = if round_up {
        mul_div_rounding_up(liquidity, numerator, *Q96)
    } else {
        mul_div(liquidity, numerator, *Q96)
    };
    amount1.map_err(|_| AmountDeltaError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_static::lazy_static;

    lazy_static! {
        static ref SQRT_PRICE_1_1: U256 = U256::from(79228162514264337593543950336_u128);
        static ref SQRT_PRICE_121_100: U256 = U256::from(87150978765690771352898345369_u128);
    }
    const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn amount0_zero_for_zero_liquidity_or_equal_prices() {
        assert_eq!(
            get_amount_0_delta(*SQRT_PRICE_1_1, *SQRT_PRICE_121_100, 0, true).unwrap(),
            U256::ZERO
        );
        assert_eq!(
            get_amount_0_delta(*SQRT_PRICE_1_1, *SQRT_PRICE_1_1, ONE_ETHER, true).unwrap(),
            U256::ZERO
        );
    }

    #[test]
    fn amount0_rejects_zero_price() {
        assert_eq!(
            get_amount_0_delta(U256::ZERO, U256::ONE, 1, true),
            Err(AmountDeltaError::InvalidPrice)
        );
    }

    #[test]
    fn amount0_for_price_1_to_1_21() {
        let up =
            get_amount_0_delta(*SQRT_PRICE_1_1, *SQRT_PRICE_121_100, ONE_ETHER, true).unwrap();
        assert_eq!(up, U256::from(90909090909090910_u128));

        let down =
            get_amount_0_delta(*SQRT_PRICE_1_1, *SQRT_PRICE_121_100, ONE_ETHER, false).unwrap();
        assert_eq!(down, up - U256::ONE);
    }

    #[test]
    fn amount1_for_price_1_to_1_21() {
        let up =
            get_amount_1_delta(*SQRT_PRICE_1_1, *SQRT_PRICE_121_100, ONE_ETHER, true).unwrap();
        assert_eq!(up, U256::from(100000000000000000_u128));

        let down =
            get_amount_1_delta(*SQRT_PRICE_1_1, *SQRT_PRICE_121_100, ONE_ETHER, false).unwrap();
        assert_eq!(down, up - U256::ONE);
    }

    #[test]
    fn amount0_handles_prices_whose_product_overflows() {
        let sqrt_p_1 =
            U256::from_str_radix("2787593149816327892691964784081045188247552", 10).unwrap();
        let sqrt_p_2 =
            U256::from_str_radix("22300745198530623141535718272648361505980416", 10).unwrap();

        let up = get_amount_0_delta(sqrt_p_1, sqrt_p_2, ONE_ETHER, true).unwrap();
        let down = get_amount_0_delta(sqrt_p_1, sqrt_p_2, ONE_ETHER, false).unwrap();
        assert_eq!(up, down + U256::ONE);
    }
}
