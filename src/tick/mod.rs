use std::collections::BTreeMap;

use ethnum::U256;

use crate::libraries::constants::{MAX_TICK, MIN_TICK};
use crate::libraries::liquidity_math::{self, AddDeltaError};
use types::TickInfo;

pub mod types;

#[cfg(test)]
mod tests;

/// Derives the per-tick liquidity cap from the tick spacing.
pub fn tick_spacing_to_max_liquidity_per_tick(tick_spacing: i32) -> u128 {
    let min_tick = (MIN_TICK / tick_spacing) * tick_spacing;
    let max_tick = (MAX_TICK / tick_spacing) * tick_spacing;
    let num_ticks = ((max_tick - min_tick) / tick_spacing) as u32 + 1;
    u128::MAX / num_ticks as u128
}

/// Fee growth accumulated inside a tick range, per unit of liquidity, Q128.
///
/// Subtraction wraps by design: outside values may exceed the global counter
/// after crossings, and the inside delta remains correct modulo 2^256.
pub fn get_fee_growth_inside(
    ticks: &BTreeMap<i32, TickInfo>,
    tick_lower: i32,
    tick_upper: i32,
    tick_current: i32,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
) -> (U256, U256) {
    let lower = ticks.get(&tick_lower).cloned().unwrap_or_default();
    let upper = ticks.get(&tick_upper).cloned().unwrap_or_default();

    let (below_0, below_1) = if tick_current >= tick_lower {
        (
            lower.fee_growth_outside_0_x128,
            lower.fee_growth_outside_1_x128,
        )
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(lower.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(lower.fee_growth_outside_1_x128),
        )
    };

    let (above_0, above_1) = if tick_current < tick_upper {
        (
            upper.fee_growth_outside_0_x128,
            upper.fee_growth_outside_1_x128,
        )
    } else {
        (
            fee_growth_global_0_x128.wrapping_sub(upper.fee_growth_outside_0_x128),
            fee_growth_global_1_x128.wrapping_sub(upper.fee_growth_outside_1_x128),
        )
    };

    (
        fee_growth_global_0_x128
            .wrapping_sub(below_0)
            .wrapping_sub(above_0),
        fee_growth_global_1_x128
            .wrapping_sub(below_1)
            .wrapping_sub(above_1),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateTickError {
    LiquidityDelta(AddDeltaError),
    LiquidityNetOverflow,
    MaxLiquidityPerTickExceeded,
}

/// Applies a liquidity delta to one bound of a position's range.
///
/// Returns whether the tick flipped between initialized and uninitialized.
/// A tick whose gross liquidity returns to zero is removed from the map.
#[allow(clippy::too_many_arguments)]
pub fn update_tick(
    ticks: &mut BTreeMap<i32, TickInfo>,
    tick: i32,
    tick_current: i32,
    liquidity_delta: i128,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
    max_liquidity_per_tick: u128,
    upper: bool,
) -> Result<bool, UpdateTickError> {
    let mut info = ticks.get(&tick).cloned().unwrap_or_default();

    let liquidity_gross_before = info.liquidity_gross;
    let liquidity_gross_after =
        liquidity_math::add_delta(liquidity_gross_before, liquidity_delta)
            .map_err(UpdateTickError::LiquidityDelta)?;

    if liquidity_gross_after > max_liquidity_per_tick {
        return Err(UpdateTickError::MaxLiquidityPerTickExceeded);
    }

    let flipped = (liquidity_gross_after == 0) != (liquidity_gross_before == 0);

    if liquidity_gross_before == 0 {
        // By convention all growth before a tick was initialized happened
        // below the tick.
        if tick <= tick_current {
            info.fee_growth_outside_0_x128 = fee_growth_global_0_x128;
            info.fee_growth_outside_1_x128 = fee_growth_global_1_x128;
        }
        info.initialized = true;
    }

    info.liquidity_gross = liquidity_gross_after;

    // The lower bound adds liquidity when crossed left to right, the upper
    // bound removes it.
    info.liquidity_net = if upper {
        info.liquidity_net
            .checked_sub(liquidity_delta)
            .ok_or(UpdateTickError::LiquidityNetOverflow)?
    } else {
        info.liquidity_net
            .checked_add(liquidity_delta)
            .ok_or(UpdateTickError::LiquidityNetOverflow)?
    };

    if liquidity_gross_after == 0 {
        ticks.remove(&tick);
    } else {
        ticks.insert(tick, info);
    }

    Ok(flipped)
}

/// Transitions a tick as the price crosses it, returning the liquidity to
/// add (left to right) or subtract (right to left).
pub fn cross_tick(
    tick_info: &mut TickInfo,
    fee_growth_global_0_x128: U256,
    fee_growth_global_1_x128: U256,
) -> i128 {
    tick_info.fee_growth_outside_0_x128 =
        fee_growth_global_0_x128.wrapping_sub(tick_info.fee_growth_outside_0_x128);
    tick_info.fee_growth_outside_1_x128 =
        fee_growth_global_1_x128.wrapping_sub(tick_info.fee_growth_outside_1_x128);
    tick_info.liquidity_net
}
