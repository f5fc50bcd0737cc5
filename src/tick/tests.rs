use std::collections::BTreeMap;

use ethnum::U256;

use super::types::TickInfo;
use super::*;

fn max_liquidity() -> u128 {
    tick_spacing_to_max_liquidity_per_tick(60)
}

#[test]
fn max_liquidity_per_tick_for_common_spacings() {
    // Values match the reference implementation for the 0.3% fee tier.
    assert_eq!(
        tick_spacing_to_max_liquidity_per_tick(60),
        11505743598341114571880798222544994_u128
    );
    assert!(
        tick_spacing_to_max_liquidity_per_tick(10)
            < tick_spacing_to_max_liquidity_per_tick(200)
    );
}

#[test]
fn update_tick_initializes_below_current_with_global_growth() {
    let mut ticks = BTreeMap::new();
    let global0 = U256::from(1000_u32);
    let global1 = U256::from(2000_u32);

    let flipped = update_tick(
        &mut ticks,
        -60,
        0,
        500,
        global0,
        global1,
        max_liquidity(),
        false,
    )
    .unwrap();
    assert!(flipped);

    let info = ticks.get(&-60).unwrap();
    assert_eq!(info.fee_growth_outside_0_x128, global0);
    assert_eq!(info.fee_growth_outside_1_x128, global1);
    assert_eq!(info.liquidity_net, 500);
    assert_eq!(info.liquidity_gross, 500);
}

#[test]
fn update_tick_initializes_above_current_with_zero_growth() {
    let mut ticks = BTreeMap::new();

    update_tick(
        &mut ticks,
        60,
        0,
        500,
        U256::from(1000_u32),
        U256::from(2000_u32),
        max_liquidity(),
        true,
    )
    .unwrap();

    let info = ticks.get(&60).unwrap();
    assert_eq!(info.fee_growth_outside_0_x128, U256::ZERO);
    assert_eq!(info.liquidity_net, -500);
}

#[test]
fn update_tick_releases_tick_at_zero_gross() {
    let mut ticks = BTreeMap::new();
    update_tick(
        &mut ticks,
        0,
        0,
        500,
        U256::ZERO,
        U256::ZERO,
        max_liquidity(),
        false,
    )
    .unwrap();
    let flipped = update_tick(
        &mut ticks,
        0,
        0,
        -500,
        U256::ZERO,
        U256::ZERO,
        max_liquidity(),
        false,
    )
    .unwrap();
    assert!(flipped);
    assert!(ticks.is_empty());
}

#[test]
fn update_tick_enforces_max_liquidity() {
    let mut ticks = BTreeMap::new();
    let result = update_tick(
        &mut ticks,
        0,
        0,
        (max_liquidity() + 1) as i128,
        U256::ZERO,
        U256::ZERO,
        max_liquidity(),
        false,
    );
    assert_eq!(result, Err(UpdateTickError::MaxLiquidityPerTickExceeded));
}

#[test]
fn burn_below_gross_is_an_error() {
    let mut ticks = BTreeMap::new();
    let result = update_tick(
        &mut ticks,
        0,
        0,
        -1,
        U256::ZERO,
        U256::ZERO,
        max_liquidity(),
        false,
    );
    assert!(matches!(result, Err(UpdateTickError::LiquidityDelta(_))));
}

#[test]
fn cross_tick_flips_outside_growth() {
    let mut info = TickInfo {
        liquidity_gross: 100,
        liquidity_net: 100,
        fee_growth_outside_0_x128: U256::from(30_u8),
        fee_growth_outside_1_x128: U256::from(40_u8),
        initialized: true,
    };

    let net = cross_tick(&mut info, U256::from(100_u8), U256::from(100_u8));
    assert_eq!(net, 100);
    assert_eq!(info.fee_growth_outside_0_x128, U256::from(70_u8));
    assert_eq!(info.fee_growth_outside_1_x128, U256::from(60_u8));

    // Crossing back restores the original values.
    cross_tick(&mut info, U256::from(100_u8), U256::from(100_u8));
    assert_eq!(info.fee_growth_outside_0_x128, U256::from(30_u8));
    assert_eq!(info.fee_growth_outside_1_x128, U256::from(40_u8));
}

#[test]
fn fee_growth_inside_all_cases() {
    let mut ticks = BTreeMap::new();
    let global = U256::from(1000_u32);
    update_tick(&mut ticks, -60, 0, 1, global, global, max_liquidity(), false).unwrap();
    update_tick(&mut ticks, 60, 0, 1, global, global, max_liquidity(), true).unwrap();

    // Current tick inside the range: inside growth is global minus the
    // growth recorded below (at the lower bound) and above (zero).
    let (inside0, _) = get_fee_growth_inside(&ticks, -60, 60, 0, global, global);
    assert_eq!(inside0, U256::ZERO);

    // Growth after initialization is attributed inside while in range.
    let later = U256::from(1500_u32);
    let (inside0, _) = get_fee_growth_inside(&ticks, -60, 60, 0, later, later);
    assert_eq!(inside0, U256::from(500_u32));

    // Current tick above the range: nothing further accrues inside.
    let (inside0_above, _) = get_fee_growth_inside(&ticks, -60, 60, 120, later, later);
    let (inside0_above_again, _) =
        get_fee_growth_inside(&ticks, -60, 60, 120, U256::from(9000_u32), U256::from(9000_u32));
    assert_eq!(inside0_above, inside0_above_again);
}
