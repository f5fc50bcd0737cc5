use clamm_backtest::libraries::{safe_cast::big_uint_to_u256, tick_math};
use num_bigint::ToBigUint;

// Converts a display price to its pool tick, aligned to a tick spacing.
// Handy when picking explicit --tick-lower/--tick-upper bounds.

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        eprintln!("usage: price_to_tick <decimals0> <decimals1> <price> <tick_spacing>");
        std::process::exit(2);
    }

    let decimals0: u8 = args[1].parse().expect("decimals0 must be an integer");
    let decimals1: u8 = args[2].parse().expect("decimals1 must be an integer");
    let price: f64 = args[3].parse().expect("price must be a positive float");
    let tick_spacing: i32 = args[4]
        .parse()
        .expect("tick_spacing must be a positive integer");

    if price <= 0.0 || tick_spacing <= 0 {
        eprintln!("price and tick_spacing must be positive");
        std::process::exit(2);
    }

    // Raw on-chain price from the display price, then sqrt into Q96.
    let raw_price = price * 10.0_f64.powi(decimals1 as i32 - decimals0 as i32);
    let sqrt_price_x96_floating = raw_price.sqrt() * 2.0_f64.powi(96);

    let sqrt_price_x96 = big_uint_to_u256(
        sqrt_price_x96_floating
            .to_biguint()
            .expect("sqrt price out of range"),
    )
    .expect("sqrt price does not fit in U256");

    let tick = tick_math::get_tick_at_sqrt_ratio(sqrt_price_x96);
    let aligned = tick.div_euclid(tick_spacing) * tick_spacing;

    println!("sqrt_price_x96: {sqrt_price_x96}");
    println!("tick: {tick} (aligned to spacing {tick_spacing}: {aligned})");
}
