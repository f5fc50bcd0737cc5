use super::{align_tick, Action, Snapshot};

/// Single position of fixed tick width, recentered with a swap whenever the
/// current tick drifts past the threshold (one bp of price is one tick to a
/// close approximation).
#[derive(Debug)]
pub struct FixedWidth {
    width_ticks: i32,
    threshold_ticks: i32,
    center_tick: i32,
    opened: bool,
}

impl FixedWidth {
    pub fn new(width_ticks: i32, threshold_bps: u32) -> Self {
        Self {
            width_ticks,
            threshold_ticks: threshold_bps as i32,
            center_tick: 0,
            opened: false,
        }
    }

    fn range_around(&self, tick: i32, spacing: i32) -> (i32, i32) {
        let half = self.width_ticks / 2;
        let tick_lower = align_tick(tick - half, spacing);
        let tick_upper = align_tick(tick + half, spacing).max(tick_lower + spacing);
        (tick_lower, tick_upper)
    }

    pub fn on_event(&mut self, snapshot: &Snapshot) -> Action {
        let tick = snapshot.pool.tick;
        let spacing = snapshot.pool.tick_spacing;

        if !self.opened {
            let (tick_lower, tick_upper) = self.range_around(tick, spacing);
            self.opened = true;
            self.center_tick = tick;
            return Action::Open {
                tick_lower,
                tick_upper,
                amount0: snapshot.idle0,
                amount1: snapshot.idle1,
            };
        }

        let deviation = (tick - self.center_tick).abs();
        let out_of_range = snapshot
            .positions
            .iter()
            .any(|(lower, upper, _)| tick < *lower || tick >= *upper);

        if deviation <= self.threshold_ticks && !out_of_range {
            return Action::Hold;
        }

        let (tick_lower, tick_upper) = self.range_around(tick, spacing);
        self.center_tick = tick;
        Action::Rebalance {
            tick_lower,
            tick_upper,
        }
    }
}
