use std::collections::BTreeMap;

use ethnum::U256;

use crate::tick::types::TickInfo;

/// Full replayed state of a single concentrated-liquidity pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    /// Current price in Q64.96 format.
    pub sqrt_price_x96: U256,
    /// Current tick index, consistent with `sqrt_price_x96`.
    pub tick: i32,
    /// Liquidity active at the current tick.
    pub liquidity: u128,
    pub fee_growth_global_0_x128: U256,
    pub fee_growth_global_1_x128: U256,
    /// LP fee in hundredths of a bip (3000 = 0.3%).
    pub fee: u32,
    pub tick_spacing: i32,
    /// Protocol fee in pips, zero unless configured.
    pub protocol_fee: u16,
    pub max_liquidity_per_tick: u128,
    /// Initialized ticks, created lazily and released at zero gross liquidity.
    pub ticks: BTreeMap<i32, TickInfo>,
}
