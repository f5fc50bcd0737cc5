use std::collections::BTreeMap;

use ethnum::U256;

use crate::libraries::{
    amount_delta::{get_amount_0_delta, get_amount_1_delta, AmountDeltaError},
    constants::{MAX_TICK, MIN_TICK, Q128},
    full_math::{mul_div, FullMathError},
    liquidity_math::{self, AddDeltaError},
    tick_math,
};
use crate::pool::PoolState;
use crate::tick::{get_fee_growth_inside, update_tick, UpdateTickError};
use types::{PositionInfo, PositionKey};

pub mod types;

/// Owner identifier the backtest driver books simulated positions under.
/// Event-stream owners are hex addresses, so this can never collide.
pub const STRATEGY_OWNER: &str = "strategy";

#[derive(Debug, Clone, PartialEq)]
pub enum ModifyPositionError {
    ZeroLiquidity,
    InvalidTickRange,
    PositionNotFound,
    InsufficientLiquidity { have: u128, want: u128 },
    Tick(UpdateTickError),
    Liquidity(AddDeltaError),
    Amounts(AmountDeltaError),
    Math(FullMathError),
    FeeOverflow,
}

/// Token amounts moved by a mint or burn, plus the fees settled onto the
/// position while touching it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyOutcome {
    pub amount0: U256,
    pub amount1: U256,
    pub fees_settled_0: u128,
    pub fees_settled_1: u128,
}

/// All positions of a run, on-chain LPs and the simulated strategy alike,
/// keyed by `(owner, tick_lower, tick_upper)`.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: BTreeMap<PositionKey, PositionInfo>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PositionKey) -> Option<&PositionInfo> {
        self.positions.get(key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Ranges currently held by an owner, with their liquidity.
    pub fn ranges_of(&self, owner: &str) -> Vec<(i32, i32, u128)> {
        self.positions
            .iter()
            .filter(|(key, _)| key.owner == owner)
            .map(|(key, info)| (key.tick_lower, key.tick_upper, info.liquidity))
            .collect()
    }

    /// Adds liquidity to a position, creating it on first touch. Returns the
    /// token amounts consumed (rounded up).
    pub fn mint(
        &mut self,
        pool: &mut PoolState,
        key: &PositionKey,
        liquidity: u128,
    ) -> Result<ModifyOutcome, ModifyPositionError> {
        if liquidity == 0 {
            return Err(ModifyPositionError::ZeroLiquidity);
        }
        self.modify(pool, key, liquidity as i128)
    }

    /// Removes liquidity from a position. Returns the token amounts released
    /// (rounded down).
    pub fn burn(
        &mut self,
        pool: &mut PoolState,
        key: &PositionKey,
        liquidity: u128,
    ) -> Result<ModifyOutcome, ModifyPositionError> {
        if liquidity == 0 {
            return Err(ModifyPositionError::ZeroLiquidity);
        }
        let have = self
            .positions
            .get(key)
            .ok_or(ModifyPositionError::PositionNotFound)?
            .liquidity;
        if have < liquidity {
            return Err(ModifyPositionError::InsufficientLiquidity {
                have,
                want: liquidity,
            });
        }
        self.modify(pool, key, -(liquidity as i128))
    }

    /// Withdraws all uncollected fees. A drained position with zero
    /// liquidity is removed from the book.
    pub fn collect(&mut self, key: &PositionKey) -> (u128, u128) {
        let Some(info) = self.positions.get_mut(key) else {
            return (0, 0);
        };
        let owed = (info.tokens_owed_0, info.tokens_owed_1);
        info.tokens_owed_0 = 0;
        info.tokens_owed_1 = 0;
        if info.liquidity == 0 {
            self.positions.remove(key);
        }
        owed
    }

    /// Fees the position would hold after a settlement, without mutating:
    /// already-owed tokens plus growth accrued since the last touch.
    pub fn pending_fees(&self, pool: &PoolState, key: &PositionKey) -> (u128, u128) {
        let Some(info) = self.positions.get(key) else {
            return (0, 0);
        };
        let (inside_0, inside_1) = get_fee_growth_inside(
            &pool.ticks,
            key.tick_lower,
            key.tick_upper,
            pool.tick,
            pool.fee_growth_global_0_x128,
            pool.fee_growth_global_1_x128,
        );
        let accrued = |inside: U256, last: U256| -> u128 {
            mul_div(inside.wrapping_sub(last), U256::from(info.liquidity), *Q128)
                .ok()
                .and_then(|fee| u128::try_from(fee).ok())
                .unwrap_or(0)
        };
        (
            info.tokens_owed_0 + accrued(inside_0, info.fee_growth_inside_0_last_x128),
            info.tokens_owed_1 + accrued(inside_1, info.fee_growth_inside_1_last_x128),
        )
    }

    fn modify(
        &mut self,
        pool: &mut PoolState,
        key: &PositionKey,
        liquidity_delta: i128,
    ) -> Result<ModifyOutcome, ModifyPositionError> {
        let (tick_lower, tick_upper) = (key.tick_lower, key.tick_upper);
        if tick_lower >= tick_upper || tick_lower < MIN_TICK || tick_upper > MAX_TICK {
            return Err(ModifyPositionError::InvalidTickRange);
        }

        // Bound bookkeeping first; a fresh bound picks up its
        // fee_growth_outside initialization before the inside snapshot below.
        update_tick(
            &mut pool.ticks,
            tick_lower,
            pool.tick,
            liquidity_delta,
            pool.fee_growth_global_0_x128,
            pool.fee_growth_global_1_x128,
            pool.max_liquidity_per_tick,
            false,
        )
        .map_err(ModifyPositionError::Tick)?;
        update_tick(
            &mut pool.ticks,
            tick_upper,
            pool.tick,
            liquidity_delta,
            pool.fee_growth_global_0_x128,
            pool.fee_growth_global_1_x128,
            pool.max_liquidity_per_tick,
            true,
        )
        .map_err(ModifyPositionError::Tick)?;

        let (inside_0, inside_1) = get_fee_growth_inside(
            &pool.ticks,
            tick_lower,
            tick_upper,
            pool.tick,
            pool.fee_growth_global_0_x128,
            pool.fee_growth_global_1_x128,
        );

        // Settle accrued fees before the liquidity change. A freshly created
        // position has zero liquidity here, so historical growth credits
        // nothing and the snapshot below anchors future attribution.
        let info = self.positions.entry(key.clone()).or_default();
        let liquidity_before = info.liquidity;

        let fee_0 = mul_div(
            inside_0.wrapping_sub(info.fee_growth_inside_0_last_x128),
            U256::from(liquidity_before),
            *Q128,
        )
        .map_err(ModifyPositionError::Math)?;
        let fee_1 = mul_div(
            inside_1.wrapping_sub(info.fee_growth_inside_1_last_x128),
            U256::from(liquidity_before),
            *Q128,
        )
        .map_err(ModifyPositionError::Math)?;

        let fees_settled_0 =
            u128::try_from(fee_0).map_err(|_| ModifyPositionError::FeeOverflow)?;
        let fees_settled_1 =
            u128::try_from(fee_1).map_err(|_| ModifyPositionError::FeeOverflow)?;

        info.tokens_owed_0 = info
            .tokens_owed_0
            .checked_add(fees_settled_0)
            .ok_or(ModifyPositionError::FeeOverflow)?;
        info.tokens_owed_1 = info
            .tokens_owed_1
            .checked_add(fees_settled_1)
            .ok_or(ModifyPositionError::FeeOverflow)?;
        info.fee_growth_inside_0_last_x128 = inside_0;
        info.fee_growth_inside_1_last_x128 = inside_1;

        info.liquidity = liquidity_math::add_delta(liquidity_before, liquidity_delta)
            .map_err(ModifyPositionError::Liquidity)?;
        let drained = info.liquidity == 0 && info.tokens_owed_0 == 0 && info.tokens_owed_1 == 0;
        if drained {
            self.positions.remove(key);
        }

        // Token amounts for the liquidity delta, split by where the current
        // price sits relative to the range. Mints round against the minter.
        let round_up = liquidity_delta > 0;
        let liquidity_abs = liquidity_delta.unsigned_abs();
        let sqrt_lower = tick_math::get_sqrt_ratio_at_tick(tick_lower);
        let sqrt_upper = tick_math::get_sqrt_ratio_at_tick(tick_upper);

        let mut outcome = ModifyOutcome {
            fees_settled_0,
            fees_settled_1,
            ..Default::default()
        };

        if pool.tick < tick_lower {
            outcome.amount0 = get_amount_0_delta(sqrt_lower, sqrt_upper, liquidity_abs, round_up)
                .map_err(ModifyPositionError::Amounts)?;
        } else if pool.tick < tick_upper {
            outcome.amount0 =
                get_amount_0_delta(pool.sqrt_price_x96, sqrt_upper, liquidity_abs, round_up)
                    .map_err(ModifyPositionError::Amounts)?;
            outcome.amount1 =
                get_amount_1_delta(sqrt_lower, pool.sqrt_price_x96, liquidity_abs, round_up)
                    .map_err(ModifyPositionError::Amounts)?;
            pool.liquidity = liquidity_math::add_delta(pool.liquidity, liquidity_delta)
                .map_err(ModifyPositionError::Liquidity)?;
        } else {
            outcome.amount1 = get_amount_1_delta(sqrt_lower, sqrt_upper, liquidity_abs, round_up)
                .map_err(ModifyPositionError::Amounts)?;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libraries::constants::Q128;

    fn test_pool() -> PoolState {
        let sqrt_price = tick_math::get_sqrt_ratio_at_tick(70000);
        PoolState::initialize(sqrt_price, 3000, 60).unwrap()
    }

    fn key(owner: &str, lower: i32, upper: i32) -> PositionKey {
        PositionKey::new(owner, lower, upper)
    }

    #[test]
    fn mint_in_range_activates_pool_liquidity() {
        let mut pool = test_pool();
        let mut book = PositionBook::new();

        let outcome = book
            .mint(&mut pool, &key("lp", 69000, 72000), 1_000_000)
            .unwrap();
        assert!(outcome.amount0 > U256::ZERO);
        assert!(outcome.amount1 > U256::ZERO);
        assert_eq!(pool.liquidity, 1_000_000);
        assert_eq!(pool.ticks.get(&69000).unwrap().liquidity_net, 1_000_000);
        assert_eq!(pool.ticks.get(&72000).unwrap().liquidity_net, -1_000_000);
    }

    #[test]
    fn mint_out_of_range_is_single_sided() {
        let mut pool = test_pool();
        let mut book = PositionBook::new();

        // Entirely above the current price: token0 only.
        let above = book
            .mint(&mut pool, &key("lp", 70060, 70120), 1_000_000)
            .unwrap();
        assert!(above.amount0 > U256::ZERO);
        assert_eq!(above.amount1, U256::ZERO);

        // Entirely below: token1 only.
        let below = book
            .mint(&mut pool, &key("lp", 69000, 69060), 1_000_000)
            .unwrap();
        assert_eq!(below.amount0, U256::ZERO);
        assert!(below.amount1 > U256::ZERO);

        assert_eq!(pool.liquidity, 0);
    }

    #[test]
    fn zero_liquidity_mint_is_rejected() {
        let mut pool = test_pool();
        let mut book = PositionBook::new();
        assert_eq!(
            book.mint(&mut pool, &key("lp", 69000, 72000), 0),
            Err(ModifyPositionError::ZeroLiquidity)
        );
    }

    #[test]
    fn burn_exceeding_liquidity_is_rejected() {
        let mut pool = test_pool();
        let mut book = PositionBook::new();
        let position = key("lp", 69000, 72000);
        book.mint(&mut pool, &position, 500).unwrap();
        assert_eq!(
            book.burn(&mut pool, &position, 501),
            Err(ModifyPositionError::InsufficientLiquidity {
                have: 500,
                want: 501
            })
        );
    }

    #[test]
    fn burn_releases_ticks_and_position() {
        let mut pool = test_pool();
        let mut book = PositionBook::new();
        let position = key("lp", 69000, 72000);

        book.mint(&mut pool, &position, 1_000_000).unwrap();
        book.burn(&mut pool, &position, 1_000_000).unwrap();

        assert_eq!(pool.liquidity, 0);
        assert!(pool.ticks.is_empty());
        assert!(book.get(&position).is_none());
    }

    #[test]
    fn fresh_position_is_not_credited_historical_growth() {
        let mut pool = test_pool();
        pool.fee_growth_global_0_x128 = U256::from(500_u32) * *Q128;
        let mut book = PositionBook::new();
        let position = key("lp", 69000, 72000);

        book.mint(&mut pool, &position, 1_000).unwrap();
        let info = book.get(&position).unwrap();
        assert_eq!(info.tokens_owed_0, 0);

        // A second touch with no growth in between still credits nothing.
        let outcome = book.mint(&mut pool, &position, 1_000).unwrap();
        assert_eq!(outcome.fees_settled_0, 0);
    }

    #[test]
    fn mint_rounds_up_burn_rounds_down() {
        let mut pool = test_pool();
        let mut book = PositionBook::new();
        let position = key("lp", 69000, 72000);

        let minted = book.mint(&mut pool, &position, 1_000_000).unwrap();
        let burned = book.burn(&mut pool, &position, 1_000_000).unwrap();
        assert!(burned.amount0 <= minted.amount0);
        assert!(burned.amount1 <= minted.amount1);
        assert!(minted.amount0 - burned.amount0 <= U256::ONE);
        assert!(minted.amount1 - burned.amount1 <= U256::ONE);
    }
}
