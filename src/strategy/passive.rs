use super::{align_tick, pct_to_tick_range, Action, Snapshot};

/// Opens one position around the first observed price and never touches it
/// again. The range is either configured explicitly or derived from a
/// percentage width.
#[derive(Debug)]
pub struct PassiveRange {
    price_range_pct: f64,
    explicit_range: Option<(i32, i32)>,
    opened: bool,
}

impl PassiveRange {
    pub fn new(price_range_pct: f64, explicit_range: Option<(i32, i32)>) -> Self {
        Self {
            price_range_pct,
            explicit_range,
            opened: false,
        }
    }

    pub fn on_event(&mut self, snapshot: &Snapshot) -> Action {
        if self.opened {
            return Action::Hold;
        }

        let spacing = snapshot.pool.tick_spacing;
        let (tick_lower, tick_upper) = match self.explicit_range {
            Some((lower, upper)) => (align_tick(lower, spacing), align_tick(upper, spacing)),
            None => {
                let half_width = pct_to_tick_range(self.price_range_pct, spacing, 10);
                let center = snapshot.pool.tick;
                (
                    align_tick(center - half_width, spacing),
                    align_tick(center + half_width, spacing),
                )
            }
        };

        if tick_lower >= tick_upper {
            return Action::Hold;
        }

        self.opened = true;
        Action::Open {
            tick_lower,
            tick_upper,
            amount0: snapshot.idle0,
            amount1: snapshot.idle1,
        }
    }
}
