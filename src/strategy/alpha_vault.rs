use std::collections::VecDeque;

use tracing::debug;

use super::{align_tick, Action, Snapshot};
use crate::valuation::sqrt_price_to_raw_price;

/// Passive dual-order policy: a symmetric base order around the current
/// tick plus a one-sided limit order in the surplus asset. Restructures on
/// a fixed clock and never swaps; the market fills the limit order instead.
#[derive(Debug)]
pub struct AlphaVault {
    base_threshold: i32,
    limit_threshold: i32,
    rebalance_interval_s: i64,
    last_rebalance: Option<i64>,
    /// Remaining close steps of an in-flight restructure, drained one action
    /// per driver poll within the same event.
    pending: VecDeque<Action>,
    /// Base order deferred until the closes above have refilled idle.
    base_pending: bool,
    /// Surplus-side open deferred until the base order has consumed idle.
    limit_pending: bool,
}

impl AlphaVault {
    pub fn new(base_threshold: i32, limit_threshold: i32, rebalance_interval_s: i64) -> Self {
        Self {
            base_threshold,
            limit_threshold,
            rebalance_interval_s,
            last_rebalance: None,
            pending: VecDeque::new(),
            base_pending: false,
            limit_pending: false,
        }
    }

    fn base_order(&self, snapshot: &Snapshot) -> Option<Action> {
        let spacing = snapshot.pool.tick_spacing;
        let tick = snapshot.pool.tick;
        let tick_lower = align_tick(tick - self.base_threshold, spacing);
        let tick_upper = align_tick(tick + self.base_threshold, spacing);
        if tick_lower >= tick_upper {
            return None;
        }
        // Token-balanced maximum: the mint sizes liquidity as the binding
        // minimum over both idle amounts.
        Some(Action::Open {
            tick_lower,
            tick_upper,
            amount0: snapshot.idle0,
            amount1: snapshot.idle1,
        })
    }

    /// One-sided order in whichever asset is left over after the base order.
    fn limit_order(&self, snapshot: &Snapshot) -> Option<Action> {
        let spacing = snapshot.pool.tick_spacing;
        let tick = snapshot.pool.tick;
        let raw_price = sqrt_price_to_raw_price(snapshot.pool.sqrt_price_x96);

        let surplus0_value = snapshot.idle0 as f64 * raw_price;
        let surplus1_value = snapshot.idle1 as f64;

        if surplus0_value > surplus1_value && snapshot.idle0 > 0 {
            // Sell order strictly above the current price.
            let tick_lower = align_tick(tick, spacing) + spacing;
            let tick_upper = tick_lower + align_tick(self.limit_threshold, spacing).max(spacing);
            Some(Action::Open {
                tick_lower,
                tick_upper,
                amount0: snapshot.idle0,
                amount1: 0,
            })
        } else if snapshot.idle1 > 0 {
            // Buy order strictly below the current price.
            let tick_upper = align_tick(tick, spacing);
            let tick_lower = tick_upper - align_tick(self.limit_threshold, spacing).max(spacing);
            Some(Action::Open {
                tick_lower,
                tick_upper,
                amount0: 0,
                amount1: snapshot.idle1,
            })
        } else {
            None
        }
    }

    pub fn on_event(&mut self, snapshot: &Snapshot) -> Action {
        // Drain an in-flight restructure first: closes, then the base
        // order, then the limit order, each sized from the idle balances
        // left by the previous step.
        if let Some(action) = self.pending.pop_front() {
            return action;
        }
        if self.base_pending {
            self.base_pending = false;
            self.limit_pending = true;
            if let Some(action) = self.base_order(snapshot) {
                return action;
            }
        }
        if self.limit_pending {
            self.limit_pending = false;
            if let Some(action) = self.limit_order(snapshot) {
                return action;
            }
            return Action::Hold;
        }

        let due = match self.last_rebalance {
            None => true,
            Some(last) => snapshot.timestamp - last >= self.rebalance_interval_s,
        };
        if !due {
            return Action::Hold;
        }

        debug!(timestamp = snapshot.timestamp, "restructuring dual orders");
        self.last_rebalance = Some(snapshot.timestamp);

        for (tick_lower, tick_upper, _) in snapshot.positions {
            self.pending.push_back(Action::Close {
                tick_lower: *tick_lower,
                tick_upper: *tick_upper,
            });
        }
        self.base_pending = true;

        match self.pending.pop_front() {
            Some(action) => action,
            None => {
                self.base_pending = false;
                self.limit_pending = true;
                self.base_order(snapshot).unwrap_or(Action::Hold)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorSet;
    use crate::libraries::tick_math::get_sqrt_ratio_at_tick;
    use crate::pool::PoolState;

    fn snapshot<'a>(
        pool: &'a PoolState,
        indicators: &'a IndicatorSet,
        positions: &'a [(i32, i32, u128)],
        timestamp: i64,
        idle0: u128,
        idle1: u128,
    ) -> Snapshot<'a> {
        Snapshot {
            timestamp,
            pool,
            positions,
            idle0,
            idle1,
            indicators,
            display_price: 109_000.0,
            decimals0: 8,
            decimals1: 6,
        }
    }

    #[test]
    fn initial_placement_is_base_then_limit() {
        let pool = PoolState::initialize(get_sqrt_ratio_at_tick(70000), 3000, 60).unwrap();
        let indicators = IndicatorSet::new(60, 14, 20);
        let mut vault = AlphaVault::new(600, 1200, 172_800);

        // First poll: symmetric base order around the current tick.
        let base = vault.on_event(&snapshot(&pool, &indicators, &[], 0, 1_000_000, 1_000_000));
        let Action::Open {
            tick_lower,
            tick_upper,
            ..
        } = base
        else {
            panic!("expected base open, got {base:?}");
        };
        assert!(tick_lower <= pool.tick - 540 && pool.tick + 540 <= tick_upper);

        // Second poll (same event): one-sided order in the surplus asset.
        // With token1 left over, the buy order sits below the price.
        let limit = vault.on_event(&snapshot(&pool, &indicators, &[], 0, 0, 400_000));
        let Action::Open {
            tick_lower,
            tick_upper,
            amount0,
            ..
        } = limit
        else {
            panic!("expected limit open, got {limit:?}");
        };
        assert_eq!(amount0, 0);
        assert!(tick_upper <= pool.tick);
        assert_eq!(tick_upper - tick_lower, 1200);

        // Third poll: done for this event.
        assert_eq!(
            vault.on_event(&snapshot(&pool, &indicators, &[], 0, 0, 0)),
            Action::Hold
        );
    }

    #[test]
    fn restructure_waits_for_the_interval() {
        let pool = PoolState::initialize(get_sqrt_ratio_at_tick(70000), 3000, 60).unwrap();
        let indicators = IndicatorSet::new(60, 14, 20);
        let mut vault = AlphaVault::new(600, 1200, 172_800);

        // Initial placement drains.
        loop {
            if vault.on_event(&snapshot(&pool, &indicators, &[], 0, 1_000_000, 1_000_000))
                == Action::Hold
            {
                break;
            }
        }

        let held = [(69420, 70620, 5000_u128)];
        assert_eq!(
            vault.on_event(&snapshot(&pool, &indicators, &held, 1000, 0, 0)),
            Action::Hold
        );

        // Past the interval the held position is closed first.
        let action = vault.on_event(&snapshot(&pool, &indicators, &held, 172_801, 0, 0));
        assert_eq!(
            action,
            Action::Close {
                tick_lower: 69420,
                tick_upper: 70620
            }
        );
    }
}
