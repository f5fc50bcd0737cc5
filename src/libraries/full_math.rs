use ethnum::U256;
use num_bigint::BigUint;
use num_traits::Zero;

use super::safe_cast::big_uint_to_u256;

#[derive(Debug, Clone, PartialEq)]
pub enum FullMathError {
    DivisionByZero,
    Overflow,
}

/// Computes floor(a * b / denominator) with the intermediate product held in
/// 512 bits, so `a * b` may exceed 256 bits as long as the quotient fits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, FullMathError> {
    if denominator == U256::ZERO {
        return Err(FullMathError::DivisionByZero);
    }

    let product =
        BigUint::from_bytes_be(&a.to_be_bytes()) * BigUint::from_bytes_be(&b.to_be_bytes());
    let quotient = product / BigUint::from_bytes_be(&denominator.to_be_bytes());

    if quotient.bits() > 256 {
        return Err(FullMathError::Overflow);
    }

    big_uint_to_u256(quotient).map_err(|_| FullMathError::Overflow)
}

/// Computes ceil(a * b / denominator), 512-bit intermediate.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, FullMathError> {
    if denominator == U256::ZERO {
        return Err(FullMathError::DivisionByZero);
    }

    let product =
        BigUint::from_bytes_be(&a.to_be_bytes()) * BigUint::from_bytes_be(&b.to_be_bytes());
    let denominator_big = BigUint::from_bytes_be(&denominator.to_be_bytes());

    let quotient = &product / &denominator_big;
    let remainder = &product % &denominator_big;
    let result = if remainder.is_zero() {
        quotient
    } else {
        quotient + BigUint::from(1_u8)
    };

    if result.bits() > 256 {
        return Err(FullMathError::Overflow);
    }

    big_uint_to_u256(result).map_err(|_| FullMathError::Overflow)
}

/// Returns ceil(x / y); division by zero returns zero and must be guarded by
/// the caller.
pub fn div_rounding_up(x: U256, y: U256) -> U256 {
    if y == U256::ZERO {
        return U256::ZERO;
    }
    let quotient = x / y;
    if x % y > U256::ZERO {
        quotient + U256::ONE
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libraries::constants::Q128;

    #[test]
    fn mul_div_rejects_zero_denominator() {
        assert_eq!(
            mul_div(*Q128, U256::from(5_u8), U256::ZERO),
            Err(FullMathError::DivisionByZero)
        );
        assert_eq!(
            mul_div_rounding_up(*Q128, *Q128, U256::ZERO),
            Err(FullMathError::DivisionByZero)
        );
    }

    #[test]
    fn mul_div_rejects_overflowing_quotient() {
        assert_eq!(
            mul_div(*Q128, *Q128, U256::ONE),
            Err(FullMathError::Overflow)
        );
        assert_eq!(
            mul_div(U256::MAX, U256::MAX, U256::MAX - U256::ONE),
            Err(FullMathError::Overflow)
        );
    }

    #[test]
    fn mul_div_all_max_inputs() {
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::MAX), Ok(U256::MAX));
    }

    #[test]
    fn mul_div_with_phantom_overflow() {
        // Q128 * 35 overflows 256 bits but the quotient does not.
        let expected = U256::from(4375_u32) * *Q128 / U256::from(1000_u32);
        assert_eq!(
            mul_div(*Q128, U256::from(35_u8) * *Q128, U256::from(8_u8) * *Q128),
            Ok(expected)
        );
    }

    #[test]
    fn mul_div_rounding_up_adds_one_on_remainder() {
        let floored = mul_div(*Q128, U256::from(1000_u32), U256::from(3000_u32)).unwrap();
        let ceiled =
            mul_div_rounding_up(*Q128, U256::from(1000_u32), U256::from(3000_u32)).unwrap();
        assert_eq!(ceiled, floored + U256::ONE);
    }

    #[test]
    fn div_rounding_up_behaviour() {
        assert_eq!(div_rounding_up(U256::from(7_u8), U256::ZERO), U256::ZERO);
        assert_eq!(div_rounding_up(U256::MAX, U256::MAX), U256::ONE);
        assert_eq!(
            div_rounding_up(*Q128, U256::from(3_u8)),
            *Q128 / U256::from(3_u8) + U256::ONE
        );
    }
}
