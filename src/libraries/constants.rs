use ethnum::U256;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref Q96: U256 = U256::ONE << 96;
    pub static ref Q128: U256 = U256::from_words(1, 0); // 2^128

    /// Sqrt ratio at MIN_TICK.
    pub static ref MIN_SQRT_RATIO: U256 = U256::from(4295128739_u64);
    /// Sqrt ratio at MAX_TICK + 1; valid sqrt prices are strictly below this.
    pub static ref MAX_SQRT_RATIO: U256 =
        U256::from_str_radix("1461446703485210103287273052203988822378723970342", 10).unwrap();
}

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q_constants() {
        assert_eq!(*Q96, U256::from(2_u8).pow(96));
        assert_eq!(*Q128, U256::from(u128::MAX) + U256::ONE);
    }
}
