use super::{align_tick, Action, Snapshot};
use crate::valuation::display_price_to_tick;

/// Bollinger-band range: `[SMA - k * sigma, SMA + k * sigma]` over closes,
/// rebuilt whenever either band edge drifts further than `min_width_ticks`
/// from the held range. No interval gating, so on choppy data this trades
/// far more often than the fixed-width policy.
#[derive(Debug)]
pub struct Bollinger {
    std_multiplier: f64,
    min_width_ticks: i32,
    opened: bool,
}

impl Bollinger {
    pub fn new(std_multiplier: f64, min_width_ticks: i32) -> Self {
        Self {
            std_multiplier,
            min_width_ticks,
            opened: false,
        }
    }

    fn band_range(&self, snapshot: &Snapshot) -> Option<(i32, i32)> {
        let sma = snapshot.indicators.sma()?;
        let sigma = snapshot.indicators.std_dev()?;
        let spacing = snapshot.pool.tick_spacing;

        let price_lower = sma - self.std_multiplier * sigma;
        let price_upper = sma + self.std_multiplier * sigma;

        let mut tick_lower = align_tick(
            display_price_to_tick(price_lower, snapshot.decimals0, snapshot.decimals1)?,
            spacing,
        );
        let mut tick_upper = align_tick(
            display_price_to_tick(price_upper, snapshot.decimals0, snapshot.decimals1)?,
            spacing,
        );

        if tick_upper - tick_lower < self.min_width_ticks {
            let mid = align_tick((tick_lower + tick_upper) / 2, spacing);
            let half = align_tick(self.min_width_ticks / 2, spacing).max(spacing);
            tick_lower = mid - half;
            tick_upper = mid + half;
        }
        Some((tick_lower, tick_upper))
    }

    pub fn on_event(&mut self, snapshot: &Snapshot) -> Action {
        let Some((tick_lower, tick_upper)) = self.band_range(snapshot) else {
            return Action::Hold;
        };

        if !self.opened || snapshot.positions.is_empty() {
            self.opened = true;
            return Action::Open {
                tick_lower,
                tick_upper,
                amount0: snapshot.idle0,
                amount1: snapshot.idle1,
            };
        }

        let (held_lower, held_upper, _) = snapshot.positions[0];
        let shift = (tick_lower - held_lower)
            .abs()
            .max((tick_upper - held_upper).abs());

        if shift <= self.min_width_ticks {
            return Action::Hold;
        }

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

    fn snapshot<'a>(
        pool: &'a PoolState,
        indicators: &'a IndicatorSet,
        positions: &'a [(i32, i32, u128)],
        display_price: f64,
    ) -> Snapshot<'a> {
        Snapshot {
            timestamp: 0,
            pool,
            positions,
            idle0: 1_000_000,
            idle1: 1_000_000,
            indicators,
            display_price,
            decimals0: 8,
            decimals1: 6,
        }
    }

    #[test]
    fn holds_until_bands_are_warm() {
        let pool = PoolState::initialize(get_sqrt_ratio_at_tick(70000), 3000, 60).unwrap();
        let cold = IndicatorSet::new(60, 14, 20);
        let mut strategy = Bollinger::new(2.0, 120);
        assert_eq!(
            strategy.on_event(&snapshot(&pool, &cold, &[], 109_000.0)),
            Action::Hold
        );
    }

    #[test]
    fn opens_at_bands_and_rebuilds_on_band_shift() {
        let pool = PoolState::initialize(get_sqrt_ratio_at_tick(70000), 3000, 60).unwrap();
        let display = sqrt_price_to_display_price(pool.sqrt_price_x96, 8, 6);

        let mut indicators = IndicatorSet::new(60, 14, 20);
        for i in 0..21 {
            // Small oscillation around the pool price keeps sigma modest.
            let wiggle = 1.0 + 0.002 * (i % 3) as f64;
            indicators.update(i * 60, display * wiggle);
        }

        let mut strategy = Bollinger::new(2.0, 120);
        let open = strategy.on_event(&snapshot(&pool, &indicators, &[], display));
        let Action::Open {
            tick_lower,
            tick_upper,
            ..
        } = open
        else {
            panic!("expected open, got {open:?}");
        };
        assert!(tick_upper - tick_lower >= 120);
        let held = [(tick_lower, tick_upper, 1000_u128)];

        // Same bands: hold.
        assert_eq!(
            strategy.on_event(&snapshot(&pool, &indicators, &held, display)),
            Action::Hold
        );

        // Feed a strong trend so the bands run away from the held range.
        for i in 21..42 {
            indicators.update(i * 60, display * (1.0 + 0.01 * (i - 20) as f64));
        }
        let action = strategy.on_event(&snapshot(&pool, &indicators, &held, display * 1.2));
        assert!(matches!(action, Action::Rebalance { .. }), "got {action:?}");
    }
}
