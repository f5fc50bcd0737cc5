use ethnum::U256;

use crate::libraries::{
    constants::{MAX_SQRT_RATIO, MIN_SQRT_RATIO, Q128},
    fee_math::fee_amount_from_input,
    full_math::mul_div,
    liquidity_math,
    tick_math,
};
use crate::tick::{cross_tick, tick_spacing_to_max_liquidity_per_tick};

pub mod types;


pub use types::PoolState;

#[derive(Debug, Clone, PartialEq)]
pub enum PoolError {
    InvalidSqrtPrice,
    InvalidTickSpacing,
    AlreadyInitialized,
    FeeGrowthOverflow { tick: i32 },
    LiquidityOverflow { tick: i32 },
}

/// Outcome of replaying one swap against the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapApplied {
    /// Fee charged on the gross input leg, credited to fee growth.
    pub fee_amount: U256,
    /// True when the fee was taken from token0 (a price-down swap).
    pub fee_on_token0: bool,
    /// True when active liquidity was zero and the fee had no one to credit.
    pub fee_dropped: bool,
    /// Initialized ticks crossed while adopting the event's post-state.
    pub ticks_crossed: Vec<i32>,
    /// Tracked active liquidity disagreed with the event's post-state.
    pub liquidity_mismatch: Option<(u128, u128)>,
}

impl PoolState {
    /// Creates a pool at the given price. Idempotency for repeat
    /// initialization with identical arguments is enforced by the replayer,
    /// which owns the `Option<PoolState>` slot.
    pub fn initialize(
        sqrt_price_x96: U256,
        fee: u32,
        tick_spacing: i32,
    ) -> Result<Self, PoolError> {
        if sqrt_price_x96 < *MIN_SQRT_RATIO || sqrt_price_x96 >= *MAX_SQRT_RATIO {
            return Err(PoolError::InvalidSqrtPrice);
        }
        if tick_spacing <= 0 {
            return Err(PoolError::InvalidTickSpacing);
        }

        let tick = tick_math::get_tick_at_sqrt_ratio(sqrt_price_x96);
        Ok(Self {
            sqrt_price_x96,
            tick,
            liquidity: 0,
            fee_growth_global_0_x128: U256::ZERO,
            fee_growth_global_1_x128: U256::ZERO,
            fee,
            tick_spacing,
            protocol_fee: 0,
            max_liquidity_per_tick: tick_spacing_to_max_liquidity_per_tick(tick_spacing),
            ticks: std::collections::BTreeMap::new(),
        })
    }

    /// Whether a range contains the current tick.
    pub fn in_range(&self, tick_lower: i32, tick_upper: i32) -> bool {
        tick_lower <= self.tick && self.tick < tick_upper
    }

    /// Replays a swap, trusting the event's post-state.
    ///
    /// Credits the LP fee on the gross input leg to global fee growth,
    /// crosses every initialized tick between the old and new tick so that
    /// `fee_growth_outside` and active liquidity stay consistent, then
    /// adopts the event's price, tick, and liquidity as ground truth.
    pub fn apply_swap(
        &mut self,
        amount0: i128,
        amount1: i128,
        sqrt_price_x96_after: U256,
        tick_after: i32,
        liquidity_after: u128,
    ) -> Result<SwapApplied, PoolError> {
        let mut applied = SwapApplied::default();

        // Zero-amount swaps are no-ops.
        if amount0 == 0 && amount1 == 0 {
            return Ok(applied);
        }

        if sqrt_price_x96_after < *MIN_SQRT_RATIO || sqrt_price_x96_after >= *MAX_SQRT_RATIO {
            return Err(PoolError::InvalidSqrtPrice);
        }

        // The fee comes out of the positive (input) leg. token0 in means the
        // pool price moved down.
        let zero_for_one = amount0 > 0;
        let amount_in_gross = if zero_for_one {
            U256::from(amount0.unsigned_abs())
        } else {
            U256::from(amount1.unsigned_abs())
        };
        applied.fee_on_token0 = zero_for_one;
        applied.fee_amount = fee_amount_from_input(amount_in_gross, self.fee);

        let liquidity_before = self.liquidity;
        if liquidity_before > 0 {
            let fee_growth_delta = mul_div(applied.fee_amount, *Q128, U256::from(liquidity_before))
                .map_err(|_| PoolError::FeeGrowthOverflow { tick: self.tick })?;
            let global = if zero_for_one {
                &mut self.fee_growth_global_0_x128
            } else {
                &mut self.fee_growth_global_1_x128
            };
            *global = global
                .checked_add(fee_growth_delta)
                .ok_or(PoolError::FeeGrowthOverflow { tick: self.tick })?;
        } else {
            // No liquidity in range: the fee has no LP to accrue to and is
            // dropped rather than credited retroactively.
            applied.fee_dropped = applied.fee_amount > U256::ZERO;
        }

        // Cross initialized ticks between the old and new tick. Moving up
        // crosses ticks in (old, new] adding liquidity_net; moving down
        // crosses ticks in (new, old] subtracting it.
        let old_tick = self.tick;
        let global0 = self.fee_growth_global_0_x128;
        let global1 = self.fee_growth_global_1_x128;

        let mut liquidity = self.liquidity;
        if tick_after > old_tick {
            for (t, info) in self.ticks.range_mut(old_tick + 1..=tick_after) {
                let net = cross_tick(info, global0, global1);
                liquidity = liquidity_math::add_delta(liquidity, net)
                    .map_err(|_| PoolError::LiquidityOverflow { tick: *t })?;
                applied.ticks_crossed.push(*t);
            }
        } else if tick_after < old_tick {
            for (t, info) in self.ticks.range_mut(tick_after + 1..=old_tick).rev() {
                let net = cross_tick(info, global0, global1);
                liquidity = liquidity_math::add_delta(liquidity, -net)
                    .map_err(|_| PoolError::LiquidityOverflow { tick: *t })?;
                applied.ticks_crossed.push(*t);
            }
        }
        self.liquidity = liquidity;

        if self.liquidity != liquidity_after {
            applied.liquidity_mismatch = Some((self.liquidity, liquidity_after));
        }

        // On-chain truth wins.
        self.sqrt_price_x96 = sqrt_price_x96_after;
        self.tick = tick_after;
        self.liquidity = liquidity_after;

        Ok(applied)
    }
}
