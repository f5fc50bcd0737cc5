use ethnum::{I256, U256};
use lazy_static::lazy_static;

use super::constants::{MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO, MIN_TICK};

// Precomputed 1.0001^(2^k) ratios in Q128, k = 1..=19. Together with the
// k = 0 base these reproduce the canonical V3 bit-decomposition exactly.
lazy_static! {
    static ref TWO_POW_32: U256 = U256::ONE << 32;
    static ref TWO_POW_128: U256 = U256::from_words(1, 0);
    static ref RATIO_BASE: U256 =
        U256::from_str_radix("fffcb933bd6fad37aa2d162d1a594001", 16).unwrap();
    static ref RATIOS: [U256; 19] = [
        U256::from_str_radix("fff97272373d413259a46990580e213a", 16).unwrap(),
        U256::from_str_radix("fff2e50f5f656932ef12357cf3c7fdcc", 16).unwrap(),
        U256::from_str_radix("ffe5caca7e10e4e61c3624eaa0941cd0", 16).unwrap(),
        U256::from_str_radix("ffcb9843d60f6159c9db58835c926644", 16).unwrap(),
        U256::from_str_radix("ff973b41fa98c081472e6896dfb254c0", 16).unwrap(),
        U256::from_str_radix("ff2ea16466c96a3843ec78b326b52861", 16).unwrap(),
        U256::from_str_radix("fe5dee046a99a2a811c461f1969c3053", 16).unwrap(),
        U256::from_str_radix("fcbe86c7900a88aedcffc83b479aa3a4", 16).unwrap(),
        U256::from_str_radix("f987a7253ac413176f2b074cf7815e54", 16).unwrap(),
        U256::from_str_radix("f3392b0822b70005940c7a398e4b70f3", 16).unwrap(),
        U256::from_str_radix("e7159475a2c29b7443b29c7fa6e889d9", 16).unwrap(),
        U256::from_str_radix("d097f3bdfd2022b8845ad8f792aa5825", 16).unwrap(),
        U256::from_str_radix("a9f746462d870fdf8a65dc1f90e061e5", 16).unwrap(),
        U256::from_str_radix("70d869a156d2a1b890bb3df62baf32f7", 16).unwrap(),
        U256::from_str_radix("31be135f97d08fd981231505542fcfa6", 16).unwrap(),
        U256::from_str_radix("9aa508b5b7a84e1c677de54f3e99bc9", 16).unwrap(),
        U256::from_str_radix("5d6af8dedb81196699c329225ee604", 16).unwrap(),
        U256::from_str_radix("2216e584f5fa1ea926041bedfe98", 16).unwrap(),
        U256::from_str_radix("48a170391f7dc42444e8fa2", 16).unwrap(),
    ];
    static ref LOG_2_COEFF: I256 = I256::from_str_radix("255738958999603826347141", 10).unwrap();
    static ref TICK_LOW_OFFSET: I256 =
        I256::from_str_radix("3402992956809132418596140100660247210", 10).unwrap();
    static ref TICK_HI_OFFSET: I256 =
        I256::from_str_radix("291339464771989622907027621153398088495", 10).unwrap();
}

/// Computes sqrt(1.0001^tick) * 2^96 as a Q64.96 value.
///
/// Panics when `tick` is outside `[MIN_TICK, MAX_TICK]`; callers clamp or
/// validate tick bounds before conversion.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> U256 {
    assert!(
        (MIN_TICK..=MAX_TICK).contains(&tick),
        "tick {} out of bounds",
        tick
    );

    let abs_tick = tick.unsigned_abs();
    let mut ratio = if abs_tick & 0x1 != 0 {
        *RATIO_BASE
    } else {
        *TWO_POW_128
    };

    for (i, constant) in RATIOS.iter().enumerate() {
        if abs_tick & (1 << (i + 1)) != 0 {
            ratio = (ratio * constant) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Round up on truncation so the Q96 result and its tick stay consistent.
    (ratio >> 32)
        + if ratio % *TWO_POW_32 == U256::ZERO {
            U256::ZERO
        } else {
            U256::ONE
        }
}

/// Computes the greatest tick whose ratio is at most `sqrt_price_x96`.
///
/// Panics when the price is outside `[MIN_SQRT_RATIO, MAX_SQRT_RATIO)`.
pub fn get_tick_at_sqrt_ratio(sqrt_price_x96: U256) -> i32 {
    assert!(
        sqrt_price_x96 >= *MIN_SQRT_RATIO && sqrt_price_x96 < *MAX_SQRT_RATIO,
        "sqrt price out of bounds"
    );

    let ratio = sqrt_price_x96 << 32;
    let msb = most_significant_bit(ratio);
    let r = if msb >= 128 {
        ratio >> (msb - 127)
    } else {
        ratio << (127 - msb)
    };

    let log_2 = log_2_from_normalized(r, msb);
    let log_sqrt10001 = log_2 * *LOG_2_COEFF;

    let tick_low = ((log_sqrt10001 - *TICK_LOW_OFFSET) >> 128_u8).as_i32();
    let tick_hi = ((log_sqrt10001 + *TICK_HI_OFFSET) >> 128_u8).as_i32();

    if tick_low == tick_hi {
        tick_low
    } else if get_sqrt_ratio_at_tick(tick_hi) <= sqrt_price_x96 {
        tick_hi
    } else {
        tick_low
    }
}

fn most_significant_bit(value: U256) -> u32 {
    255 - value.leading_zeros()
}

fn log_2_from_normalized(mut r: U256, msb: u32) -> I256 {
    let mut log_2 = I256::from(msb as i32 - 128) << 64;

    for shift in (50..=63).rev() {
        r = (r * r) >> 127;
        let f = (r >> 128_u8).as_u32();
        log_2 |= I256::from(f) << shift;
        r >>= f;
    }
    log_2
}
