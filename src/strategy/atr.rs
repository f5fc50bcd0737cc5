use tracing::debug;

use super::{align_tick, Action, Snapshot};
use crate::valuation::display_price_to_tick;

/// Volatility-sized range: bounds at `price +/- multiplier * ATR`, floored
/// at a minimum width. Holds until the ATR window is warm, then recenters
/// when the price drifts from the range center or leaves the range, no more
/// often than the configured interval.
#[derive(Debug)]
pub struct AtrRange {
    multiplier: f64,
    deviation_threshold: f64,
    rebalance_interval_s: i64,
    last_rebalance: Option<i64>,
    range_center: f64,
}

/// Narrowest sensible range as a fraction of price, matching the floor the
/// range computation applies to a collapsed ATR.
const MIN_RANGE_PCT: f64 = 0.02;

impl AtrRange {
    pub fn new(multiplier: f64, deviation_threshold: f64, rebalance_interval_s: i64) -> Self {
        Self {
            multiplier,
            deviation_threshold,
            rebalance_interval_s,
            last_rebalance: None,
            range_center: 0.0,
        }
    }

    fn compute_range(&self, snapshot: &Snapshot, atr: f64) -> Option<(i32, i32)> {
        let price = snapshot.display_price;
        let spacing = snapshot.pool.tick_spacing;

        let mut range_size = atr * self.multiplier;
        range_size = range_size.max(price * MIN_RANGE_PCT);

        let price_lower = (price - range_size).max(price * 0.1);
        let price_upper = price + range_size;

        let mut tick_lower = align_tick(
            display_price_to_tick(price_lower, snapshot.decimals0, snapshot.decimals1)?,
            spacing,
        );
        let mut tick_upper = align_tick(
            display_price_to_tick(price_upper, snapshot.decimals0, snapshot.decimals1)?,
            spacing,
        );

        // Never narrower than five spacings.
        let min_width = spacing * 5;
        if tick_upper - tick_lower < min_width {
            let mid = align_tick((tick_lower + tick_upper) / 2, spacing);
            tick_lower = mid - min_width / 2 / spacing * spacing;
            tick_upper = tick_lower + min_width;
        }
        Some((tick_lower, tick_upper))
    }

    pub fn on_event(&mut self, snapshot: &Snapshot) -> Action {
        // Indicator warmup reads as an explicit hold.
        let Some(atr) = snapshot.indicators.atr() else {
            return Action::Hold;
        };

        if snapshot.positions.is_empty() {
            let Some((tick_lower, tick_upper)) = self.compute_range(snapshot, atr) else {
                return Action::Hold;
            };
            debug!(tick_lower, tick_upper, atr, "opening initial range");
            self.last_rebalance = Some(snapshot.timestamp);
            self.range_center = snapshot.display_price;
            return Action::Open {
                tick_lower,
                tick_upper,
                amount0: snapshot.idle0,
                amount1: snapshot.idle1,
            };
        }

        let elapsed = self
            .last_rebalance
            .map(|last| snapshot.timestamp - last)
            .unwrap_or(i64::MAX);
        if elapsed < self.rebalance_interval_s {
            return Action::Hold;
        }

        let price = snapshot.display_price;
        let deviated = self.range_center > 0.0
            && ((price - self.range_center) / self.range_center).abs() > self.deviation_threshold;
        let out_of_range = snapshot
            .positions
            .iter()
            .any(|(lower, upper, _)| snapshot.pool.tick < *lower || snapshot.pool.tick >= *upper);

        if !deviated && !out_of_range {
            return Action::Hold;
        }

        let Some((tick_lower, tick_upper)) = self.compute_range(snapshot, atr) else {
            return Action::Hold;
        };
        self.last_rebalance = Some(snapshot.timestamp);
        self.range_center = price;
        Action::Rebalance {
            tick_lower,
            tick_upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSet;
    use crate::libraries::tick_math::get_sqrt_ratio_at_tick;
    use crate::pool::PoolState;
    use crate::valuation::sqrt_price_to_display_price;

    fn warm_indicators(price: f64) -> IndicatorSet {
        let mut indicators = IndicatorSet::new(60, 14, 20);
        for i in 0..16 {
            indicators.update(i * 60, price * (1.0 + i as f64 * 0.001));
        }
        indicators
    }

    #[test]
    fn holds_until_atr_is_warm() {
        let pool = PoolState::initialize(get_sqrt_ratio_at_tick(70000), 3000, 60).unwrap();
        let cold = IndicatorSet::new(60, 14, 20);
        let mut strategy = AtrRange::new(2.0, 0.03, 180);

        let snapshot = Snapshot {
            timestamp: 0,
            pool: &pool,
            positions: &[],
            idle0: 1_000_000,
            idle1: 1_000_000,
            indicators: &cold,
            display_price: 109_000.0,
            decimals0: 8,
            decimals1: 6,
        };
        assert_eq!(strategy.on_event(&snapshot), Action::Hold);
    }

    #[test]
    fn opens_then_rebalances_after_interval_and_deviation() {
        let pool = PoolState::initialize(get_sqrt_ratio_at_tick(70000), 3000, 60).unwrap();
        let display = sqrt_price_to_display_price(pool.sqrt_price_x96, 8, 6);
        let indicators = warm_indicators(display);
        let mut strategy = AtrRange::new(2.0, 0.03, 180);

        let open = strategy.on_event(&Snapshot {
            timestamp: 1000,
            pool: &pool,
            positions: &[],
            idle0: 1_000_000,
            idle1: 1_000_000,
            indicators: &indicators,
            display_price: display,
            decimals0: 8,
            decimals1: 6,
        });
        let Action::Open {
            tick_lower,
            tick_upper,
            ..
        } = open
        else {
            panic!("expected open, got {open:?}");
        };
        assert!(tick_lower < pool.tick && pool.tick < tick_upper);
        let held = [(tick_lower, tick_upper, 1000_u128)];

        // Price deviates 5% but the interval has not elapsed: hold.
        let early = strategy.on_event(&Snapshot {
            timestamp: 1100,
            pool: &pool,
            positions: &held,
            idle0: 0,
            idle1: 0,
            indicators: &indicators,
            display_price: display * 1.05,
            decimals0: 8,
            decimals1: 6,
        });
        assert_eq!(early, Action::Hold);

        // Interval elapsed and deviation above threshold: rebalance.
        let due = strategy.on_event(&Snapshot {
            timestamp: 1000 + 180,
            pool: &pool,
            positions: &held,
            idle0: 0,
            idle1: 0,
            indicators: &indicators,
            display_price: display * 1.05,
            decimals0: 8,
            decimals1: 6,
        });
        assert!(matches!(due, Action::Rebalance { .. }), "got {due:?}");
    }

    #[test]
    fn in_range_small_deviation_holds() {
        let pool = PoolState::initialize(get_sqrt_ratio_at_tick(70000), 3000, 60).unwrap();
        let display = sqrt_price_to_display_price(pool.sqrt_price_x96, 8, 6);
        let indicators = warm_indicators(display);
        let mut strategy = AtrRange::new(2.0, 0.03, 180);

        let open = strategy.on_event(&Snapshot {
            timestamp: 0,
            pool: &pool,
            positions: &[],
            idle0: 1,
            idle1: 1,
            indicators: &indicators,
            display_price: display,
            decimals0: 8,
            decimals1: 6,
        });
        let Action::Open {
            tick_lower,
            tick_upper,
            ..
        } = open
        else {
            panic!("expected open");
        };
        let held = [(tick_lower, tick_upper, 1000_u128)];

        let action = strategy.on_event(&Snapshot {
            timestamp: 400,
            pool: &pool,
            positions: &held,
            idle0: 0,
            idle1: 0,
            indicators: &indicators,
            display_price: display * 1.01,
            decimals0: 8,
            decimals1: 6,
        });
        assert_eq!(action, Action::Hold);
    }
}
