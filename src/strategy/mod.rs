use crate::config::BacktestConfig;
use crate::indicators::IndicatorSet;
use crate::pool::PoolState;

pub mod alpha_vault;
pub mod atr;
pub mod bollinger;
pub mod fixed_width;
pub mod passive;

pub use alpha_vault::AlphaVault;
pub use atr::AtrRange;
pub use bollinger::Bollinger;
pub use fixed_width::FixedWidth;
pub use passive::PassiveRange;

/// What the driver shows a strategy after each replayed event.
#[derive(Debug)]
pub struct Snapshot<'a> {
    pub timestamp: i64,
    pub pool: &'a PoolState,
    /// The strategy's own open ranges: (tick_lower, tick_upper, liquidity).
    pub positions: &'a [(i32, i32, u128)],
    pub idle0: u128,
    pub idle1: u128,
    pub indicators: &'a IndicatorSet,
    /// Current price in human display units.
    pub display_price: f64,
    pub decimals0: u8,
    pub decimals1: u8,
}

/// A position action requested by a strategy. The driver executes it against
/// the book and polls again, so policies holding several positions can
/// restructure atomically within one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Hold,
    /// Mint at the range using at most the given amounts.
    Open {
        tick_lower: i32,
        tick_upper: i32,
        amount0: u128,
        amount1: u128,
    },
    /// Burn everything in the range, collect, move proceeds to idle.
    Close { tick_lower: i32, tick_upper: i32 },
    /// Close all positions, swap idle to a 50/50 value split, reopen at the
    /// range. The driver charges the configured rebalance cost.
    Rebalance { tick_lower: i32, tick_upper: i32 },
}

/// Snaps a tick down to the pool's tick spacing grid.
pub fn align_tick(tick: i32, spacing: i32) -> i32 {
    tick.div_euclid(spacing) * spacing
}

/// Tick half-width covering a +/- percentage price move, floored at a
/// minimum number of spacings and snapped to the grid.
pub fn pct_to_tick_range(pct: f64, spacing: i32, min_spacings: i32) -> i32 {
    let ticks = ((1.0 + pct).ln() / 1.0001_f64.ln()) as i32;
    let floored = ticks.max(spacing * min_spacings);
    (floored / spacing) * spacing
}

/// The active policy, dispatched as a tagged variant.
#[derive(Debug)]
pub enum Strategy {
    /// Holds the initial token mixture; never opens a position.
    Hodl,
    PassiveRange(PassiveRange),
    AtrRange(AtrRange),
    AlphaVault(AlphaVault),
    FixedWidth(FixedWidth),
    Bollinger(Bollinger),
}

impl Strategy {
    pub fn from_config(config: &BacktestConfig) -> Self {
        use crate::config::StrategyKind;
        match config.strategy {
            StrategyKind::Hold => Strategy::Hodl,
            StrategyKind::PassiveRange => Strategy::PassiveRange(PassiveRange::new(
                config.price_range_pct,
                config.explicit_range(),
            )),
            StrategyKind::Atr => Strategy::AtrRange(AtrRange::new(
                config.atr_multiplier,
                config.deviation_threshold,
                config.rebalance_interval_s,
            )),
            StrategyKind::AlphaVault => Strategy::AlphaVault(AlphaVault::new(
                config.base_threshold,
                config.limit_threshold,
                config.alpha_rebalance_interval_s,
            )),
            StrategyKind::FixedWidth => Strategy::FixedWidth(FixedWidth::new(
                config.position_width_ticks,
                config.rebalance_threshold_bps,
            )),
            StrategyKind::Bollinger => Strategy::Bollinger(Bollinger::new(
                config.std_multiplier,
                config.min_width_ticks,
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Hodl => "hold",
            Strategy::PassiveRange(_) => "passive_range",
            Strategy::AtrRange(_) => "atr",
            Strategy::AlphaVault(_) => "alpha_vault",
            Strategy::FixedWidth(_) => "fixed_width",
            Strategy::Bollinger(_) => "bollinger",
        }
    }

    pub fn on_event(&mut self, snapshot: &Snapshot) -> Action {
        match self {
            Strategy::Hodl => Action::Hold,
            Strategy::PassiveRange(s) => s.on_event(snapshot),
            Strategy::AtrRange(s) => s.on_event(snapshot),
            Strategy::AlphaVault(s) => s.on_event(snapshot),
            Strategy::FixedWidth(s) => s.on_event(snapshot),
            Strategy::Bollinger(s) => s.on_event(snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_tick_floors_toward_negative_infinity() {
        assert_eq!(align_tick(125, 60), 120);
        assert_eq!(align_tick(-125, 60), -180);
        assert_eq!(align_tick(120, 60), 120);
        assert_eq!(align_tick(0, 60), 0);
    }

    #[test]
    fn pct_range_is_snapped_and_floored() {
        // ln(1.10)/ln(1.0001) is about 953 ticks, snapped down to 900.
        assert_eq!(pct_to_tick_range(0.10, 60, 10), 900);
        // A tiny percentage falls back to the minimum width.
        assert_eq!(pct_to_tick_range(0.001, 60, 10), 600);
    }
}
