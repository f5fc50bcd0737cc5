use clamm_backtest::libraries::tick_math;
use clamm_backtest::valuation::sqrt_price_to_display_price;
use ethnum::U256;

// Decodes a raw sqrtPriceX96 from an event stream into its tick and
// display price.

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: sqrtx96_to_tick <sqrt_price_x96> <decimals0> <decimals1>");
        std::process::exit(2);
    }

    let sqrt_price_x96 =
        U256::from_str_radix(&args[1], 10).expect("sqrt_price_x96 must be a decimal integer");
    let decimals0: u8 = args[2].parse().expect("decimals0 must be an integer");
    let decimals1: u8 = args[3].parse().expect("decimals1 must be an integer");

    let tick = tick_math::get_tick_at_sqrt_ratio(sqrt_price_x96);
    let display = sqrt_price_to_display_price(sqrt_price_x96, decimals0, decimals1);

    println!("tick: {tick}");
    println!("display price: {display:.6}");
}
