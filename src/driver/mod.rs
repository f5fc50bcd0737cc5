use anyhow::{anyhow, bail, Context, Result};
use ethnum::U256;
use tracing::{debug, info, warn};

use crate::config::BacktestConfig;
use crate::events::{read_events, EventRecord};
use crate::indicators::IndicatorSet;
use crate::libraries::constants::{MAX_TICK, MIN_TICK};
use crate::libraries::liquidity_amounts::get_liquidity_for_amounts;
use crate::libraries::tick_math::get_sqrt_ratio_at_tick;
use crate::position::{types::PositionKey, STRATEGY_OWNER};
use crate::replay::{ReplayError, Replayer};
use crate::strategy::{Action, Snapshot, Strategy};
use crate::valuation::{
    position_amounts, quote_to_token0, quote_value, sqrt_price_to_display_price,
};

/// Upper bound on strategy polls per event; multi-position policies need a
/// few, a runaway policy must not stall the replay.
const MAX_ACTIONS_PER_EVENT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// One row of the portfolio series: value, the strategy's active range
/// footprint (envelope over its open positions), and fees accumulated so
/// far in quote units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuePoint {
    pub timestamp: i64,
    pub value: f64,
    pub tick_lower: Option<i32>,
    pub tick_upper: Option<i32>,
    pub fees_accum_quote: u128,
}

/// One executed (or dropped) strategy action, for the actions table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActionRecord {
    pub timestamp: i64,
    pub kind: &'static str,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub executed: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunSummary {
    pub strategy: String,
    pub events_processed: usize,
    pub swaps: u64,
    pub mints: u64,
    pub burns: u64,
    pub initial_capital_quote: u128,
    pub final_value_quote: u128,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub rebalance_count: u64,
    pub gas_spent_quote: u128,
    pub fees_earned_quote: u128,
    pub impermanent_loss_pct: f64,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    /// Warning counters surfaced in the report's warning section.
    pub discrepancies: usize,
    pub skipped_events: u64,
    pub dropped_actions: u64,
}

#[derive(Debug)]
pub struct BacktestResult {
    pub value_series: Vec<ValuePoint>,
    pub price_series: Vec<TimeSeriesPoint>,
    pub actions: Vec<ActionRecord>,
    pub summary: RunSummary,
    pub warnings: Vec<String>,
}

/// Owns one strategy run end to end: replays events, consults the strategy,
/// executes its actions against the book, and records the time series.
pub struct BacktestDriver {
    config: BacktestConfig,
    replayer: Replayer,
    strategy: Strategy,
    indicators: IndicatorSet,

    idle0: u128,
    idle1: u128,
    gas_spent_quote: u128,
    fees_collected_quote: u128,
    capital_deployed: bool,
    initial_amount0: u128,
    initial_amount1: u128,

    rebalance_count: u64,
    dropped_actions: u64,

    value_series: Vec<ValuePoint>,
    price_series: Vec<TimeSeriesPoint>,
    actions: Vec<ActionRecord>,
}

impl BacktestDriver {
    pub fn new(config: BacktestConfig) -> Self {
        let replayer = Replayer::new(config.fee_tier, config.tick_spacing);
        let strategy = Strategy::from_config(&config);
        let indicators =
            IndicatorSet::new(config.bar_interval_s, config.atr_period, config.sma_period);
        Self {
            replayer,
            strategy,
            indicators,
            idle0: 0,
            idle1: 0,
            gas_spent_quote: 0,
            fees_collected_quote: 0,
            capital_deployed: false,
            initial_amount0: 0,
            initial_amount1: 0,
            rebalance_count: 0,
            dropped_actions: 0,
            value_series: Vec::new(),
            price_series: Vec::new(),
            actions: Vec::new(),
            config,
        }
    }

    pub fn run(self) -> Result<BacktestResult> {
        let events = read_events(&self.config.data_path, &self.config.event_filter())
            .context("reading event stream")?;
        info!(
            events = events.len(),
            strategy = self.strategy.name(),
            "starting backtest"
        );
        self.run_events(&events)
    }

    pub fn run_events(mut self, events: &[EventRecord]) -> Result<BacktestResult> {
        for event in events {
            self.step(event)?;
        }
        self.finish(events)
    }

    /// Replayed state so far; scenario tests probe this between steps.
    pub fn replayer(&self) -> &Replayer {
        &self.replayer
    }

    /// Processes one event atomically: replay, indicators, strategy
    /// actions, series bookkeeping.
    pub fn step(&mut self, event: &EventRecord) -> Result<()> {
        let timestamp = event.block_timestamp();

        match self.replayer.apply(event) {
            Ok(()) => {}
            Err(ReplayError::Overflow {
                timestamp,
                block_number,
                detail,
            }) => bail!(
                "arithmetic overflow at timestamp {timestamp}, block {block_number}: {detail}"
            ),
            Err(ReplayError::Pool(e)) => bail!("pool error at timestamp {timestamp}: {e:?}"),
        }

        if let Some(pool) = self.replayer.pool() {
            let display_price = sqrt_price_to_display_price(
                pool.sqrt_price_x96,
                self.config.decimals0,
                self.config.decimals1,
            );

            if !self.capital_deployed {
                self.deploy_capital()?;
            }
            if matches!(event, EventRecord::Swap { .. }) {
                self.indicators.update(timestamp, display_price);
            }

            self.consult_strategy(timestamp, display_price)?;

            let value = self.portfolio_value()?;
            let footprint = self.active_range();
            self.value_series.push(ValuePoint {
                timestamp,
                value: value as f64,
                tick_lower: footprint.map(|(lower, _)| lower),
                tick_upper: footprint.map(|(_, upper)| upper),
                fees_accum_quote: self.fees_collected_quote + self.pending_fees_quote(),
            });
            self.price_series.push(TimeSeriesPoint {
                timestamp,
                value: display_price,
            });
        } else {
            // Pool not bootstrapped yet: capital is untouched quote.
            self.value_series.push(ValuePoint {
                timestamp,
                value: self.config.initial_capital_quote as f64,
                tick_lower: None,
                tick_upper: None,
                fees_accum_quote: 0,
            });
        }

        Ok(())
    }

    /// Splits the starting capital 50/50 by value at the first observed
    /// price. The split is the HODL basis for impermanent loss.
    fn deploy_capital(&mut self) -> Result<()> {
        let pool = self
            .replayer
            .pool()
            .ok_or_else(|| anyhow!("deploy before bootstrap"))?;
        let capital = self.config.initial_capital_quote;
        let half = capital / 2;
        let amount0 = quote_to_token0(U256::from(capital - half), pool.sqrt_price_x96)
            .map_err(|e| anyhow!("capital split failed: {e:?}"))?;
        self.idle0 = u128::try_from(amount0).map_err(|_| anyhow!("capital split overflow"))?;
        self.idle1 = half;
        self.initial_amount0 = self.idle0;
        self.initial_amount1 = self.idle1;
        self.capital_deployed = true;
        debug!(
            amount0 = self.idle0,
            amount1 = self.idle1,
            "capital deployed"
        );
        Ok(())
    }

    fn consult_strategy(&mut self, timestamp: i64, display_price: f64) -> Result<()> {
        let mut opened = false;
        let mut closed = false;

        for _ in 0..MAX_ACTIONS_PER_EVENT {
            let action = {
                let Some(pool) = self.replayer.pool.as_ref() else {
                    return Ok(());
                };
                let positions = self.replayer.book.ranges_of(STRATEGY_OWNER);
                let snapshot = Snapshot {
                    timestamp,
                    pool,
                    positions: &positions,
                    idle0: self.idle0,
                    idle1: self.idle1,
                    indicators: &self.indicators,
                    display_price,
                    decimals0: self.config.decimals0,
                    decimals1: self.config.decimals1,
                };
                self.strategy.on_event(&snapshot)
            };

            match action {
                Action::Hold => break,
                Action::Open {
                    tick_lower,
                    tick_upper,
                    amount0,
                    amount1,
                } => {
                    let executed =
                        self.open_position(tick_lower, tick_upper, amount0, amount1)?;
                    self.actions.push(ActionRecord {
                        timestamp,
                        kind: "open",
                        tick_lower,
                        tick_upper,
                        executed,
                    });
                    if !executed {
                        break;
                    }
                    opened = true;
                }
                Action::Close {
                    tick_lower,
                    tick_upper,
                } => {
                    let executed = self.close_position(tick_lower, tick_upper)?.is_some();
                    self.actions.push(ActionRecord {
                        timestamp,
                        kind: "close",
                        tick_lower,
                        tick_upper,
                        executed,
                    });
                    if !executed {
                        break;
                    }
                    closed = true;
                }
                Action::Rebalance {
                    tick_lower,
                    tick_upper,
                } => {
                    let executed = self.rebalance(tick_lower, tick_upper)?;
                    self.actions.push(ActionRecord {
                        timestamp,
                        kind: "rebalance",
                        tick_lower,
                        tick_upper,
                        executed,
                    });
                    if executed {
                        opened = true;
                        closed = true;
                    }
                    break;
                }
            }
        }

        // A cycle that both released and redeployed liquidity counts as one
        // rebalance, whichever actions composed it.
        if opened && closed {
            self.rebalance_count += 1;
        }
        Ok(())
    }

    /// Mints a strategy position sized from at most the given amounts.
    /// Returns false (and counts a dropped action) when the preconditions
    /// fail.
    fn open_position(
        &mut self,
        tick_lower: i32,
        tick_upper: i32,
        amount0: u128,
        amount1: u128,
    ) -> Result<bool> {
        let Some(pool) = self.replayer.pool.as_mut() else {
            return Ok(false);
        };

        let tick_lower = tick_lower.max(MIN_TICK);
        let tick_upper = tick_upper.min(MAX_TICK);
        if tick_lower >= tick_upper {
            warn!(tick_lower, tick_upper, "dropping open: empty range");
            self.dropped_actions += 1;
            return Ok(false);
        }

        let amount0 = amount0.min(self.idle0);
        let amount1 = amount1.min(self.idle1);

        let sqrt_lower = get_sqrt_ratio_at_tick(tick_lower);
        let sqrt_upper = get_sqrt_ratio_at_tick(tick_upper);
        let liquidity = get_liquidity_for_amounts(
            pool.sqrt_price_x96,
            sqrt_lower,
            sqrt_upper,
            U256::from(amount0),
            U256::from(amount1),
        )
        .unwrap_or(0);

        if liquidity == 0 {
            warn!(tick_lower, tick_upper, "dropping open: zero liquidity");
            self.dropped_actions += 1;
            return Ok(false);
        }

        let key = PositionKey::new(STRATEGY_OWNER, tick_lower, tick_upper);
        let outcome = self
            .replayer
            .book
            .mint(pool, &key, liquidity)
            .map_err(|e| anyhow!("strategy mint failed: {e:?}"))?;

        let used0 = u128::try_from(outcome.amount0)
            .map_err(|_| anyhow!("mint amount overflow"))?;
        let used1 = u128::try_from(outcome.amount1)
            .map_err(|_| anyhow!("mint amount overflow"))?;
        // Ceil rounding can exceed the sized amounts by one raw unit.
        self.idle0 = self.idle0.saturating_sub(used0);
        self.idle1 = self.idle1.saturating_sub(used1);

        debug!(tick_lower, tick_upper, liquidity, "opened position");
        Ok(true)
    }

    /// Burns a strategy position entirely and collects its fees into idle.
    /// Returns the closed notional in quote units, or None when there was
    /// nothing to close.
    fn close_position(&mut self, tick_lower: i32, tick_upper: i32) -> Result<Option<u128>> {
        let Some(pool) = self.replayer.pool.as_mut() else {
            return Ok(None);
        };
        let key = PositionKey::new(STRATEGY_OWNER, tick_lower, tick_upper);
        let Some(info) = self.replayer.book.get(&key) else {
            warn!(tick_lower, tick_upper, "dropping close: no such position");
            self.dropped_actions += 1;
            return Ok(None);
        };

        let liquidity = info.liquidity;
        let mut released0 = 0u128;
        let mut released1 = 0u128;
        if liquidity > 0 {
            let outcome = self
                .replayer
                .book
                .burn(pool, &key, liquidity)
                .map_err(|e| anyhow!("strategy burn failed: {e:?}"))?;
            released0 =
                u128::try_from(outcome.amount0).map_err(|_| anyhow!("burn amount overflow"))?;
            released1 =
                u128::try_from(outcome.amount1).map_err(|_| anyhow!("burn amount overflow"))?;
        }

        let (owed0, owed1) = self.replayer.book.collect(&key);
        self.idle0 += released0 + owed0;
        self.idle1 += released1 + owed1;

        let sqrt_price = pool.sqrt_price_x96;
        let fees = quote_value(U256::from(owed0), U256::from(owed1), sqrt_price)
            .map_err(|e| anyhow!("fee valuation failed: {e:?}"))?;
        let fees = u128::try_from(fees).map_err(|_| anyhow!("fee valuation overflow"))?;
        self.fees_collected_quote += fees;

        let notional = quote_value(
            U256::from(released0 + owed0),
            U256::from(released1 + owed1),
            sqrt_price,
        )
        .map_err(|e| anyhow!("close valuation failed: {e:?}"))?;
        let notional =
            u128::try_from(notional).map_err(|_| anyhow!("close valuation overflow"))?;

        debug!(tick_lower, tick_upper, liquidity, notional, "closed position");
        Ok(Some(notional))
    }

    /// Closes everything, charges the rebalance cost on the repositioned
    /// notional, swaps idle to a 50/50 value split at the current price,
    /// and reopens at the given range.
    fn rebalance(&mut self, tick_lower: i32, tick_upper: i32) -> Result<bool> {
        let held = self.replayer.book.ranges_of(STRATEGY_OWNER);

        // An identical single-range rebalance is a no-op request.
        if held.len() == 1 && held[0].0 == tick_lower && held[0].1 == tick_upper {
            warn!(tick_lower, tick_upper, "dropping rebalance: identical range");
            self.dropped_actions += 1;
            return Ok(false);
        }

        let mut notional = 0u128;
        for (lower, upper, _) in held {
            if let Some(closed) = self.close_position(lower, upper)? {
                notional += closed;
            }
        }

        let cost = notional
            .saturating_mul(self.config.rebalance_cost_bps as u128)
            / 10_000;
        let charged = cost.min(self.idle1);
        self.idle1 -= charged;
        self.gas_spent_quote += charged;

        let Some(pool) = self.replayer.pool.as_ref() else {
            return Ok(false);
        };
        let sqrt_price = pool.sqrt_price_x96;

        // Frictionless swap at spot to the 50/50 split; the cost above is
        // the only modeled friction.
        let total = quote_value(U256::from(self.idle0), U256::from(self.idle1), sqrt_price)
            .map_err(|e| anyhow!("rebalance valuation failed: {e:?}"))?;
        let total = u128::try_from(total).map_err(|_| anyhow!("rebalance valuation overflow"))?;
        let half = total / 2;
        let amount0 = quote_to_token0(U256::from(total - half), sqrt_price)
            .map_err(|e| anyhow!("rebalance split failed: {e:?}"))?;
        self.idle0 = u128::try_from(amount0).map_err(|_| anyhow!("rebalance split overflow"))?;
        self.idle1 = half;

        let opened = self.open_position(tick_lower, tick_upper, self.idle0, self.idle1)?;
        Ok(opened)
    }

    /// Idle reserves plus open positions plus uncollected fees, in raw
    /// quote units at the current price.
    fn portfolio_value(&self) -> Result<u128> {
        let Some(pool) = self.replayer.pool() else {
            return Ok(self.config.initial_capital_quote);
        };
        let sqrt_price = pool.sqrt_price_x96;

        let mut total = quote_value(U256::from(self.idle0), U256::from(self.idle1), sqrt_price)
            .map_err(|e| anyhow!("valuation failed: {e:?}"))?;

        for (tick_lower, tick_upper, liquidity) in self.replayer.book.ranges_of(STRATEGY_OWNER) {
            let (amount0, amount1) = position_amounts(liquidity, tick_lower, tick_upper, sqrt_price)
                .map_err(|e| anyhow!("position valuation failed: {e:?}"))?;
            let key = PositionKey::new(STRATEGY_OWNER, tick_lower, tick_upper);
            let (owed0, owed1) = self.replayer.book.pending_fees(pool, &key);
            total = total
                + quote_value(
                    amount0 + U256::from(owed0),
                    amount1 + U256::from(owed1),
                    sqrt_price,
                )
                .map_err(|e| anyhow!("fee valuation failed: {e:?}"))?;
        }

        u128::try_from(total).map_err(|_| anyhow!("portfolio value overflow"))
    }

    /// Envelope over the strategy's open ranges, if any.
    fn active_range(&self) -> Option<(i32, i32)> {
        self.replayer
            .book
            .ranges_of(STRATEGY_OWNER)
            .iter()
            .fold(None, |acc, (lower, upper, _)| match acc {
                None => Some((*lower, *upper)),
                Some((acc_lower, acc_upper)) => {
                    Some((acc_lower.min(*lower), acc_upper.max(*upper)))
                }
            })
    }

    /// Uncollected fees on open strategy positions, in quote units.
    fn pending_fees_quote(&self) -> u128 {
        let Some(pool) = self.replayer.pool() else {
            return 0;
        };
        let mut total = 0u128;
        for (tick_lower, tick_upper, _) in self.replayer.book.ranges_of(STRATEGY_OWNER) {
            let key = PositionKey::new(STRATEGY_OWNER, tick_lower, tick_upper);
            let (owed0, owed1) = self.replayer.book.pending_fees(pool, &key);
            if let Ok(value) =
                quote_value(U256::from(owed0), U256::from(owed1), pool.sqrt_price_x96)
            {
                total += u128::try_from(value).unwrap_or(0);
            }
        }
        total
    }

    pub fn finish(self, events: &[EventRecord]) -> Result<BacktestResult> {
        let final_value = self.portfolio_value()?;
        let initial = self.config.initial_capital_quote;
        let fees_earned = self.fees_collected_quote + self.pending_fees_quote();

        let total_return_pct = if initial > 0 {
            (final_value as f64 - initial as f64) / initial as f64 * 100.0
        } else {
            0.0
        };

        let mut peak = f64::MIN;
        let mut max_drawdown_pct: f64 = 0.0;
        for point in &self.value_series {
            peak = peak.max(point.value);
            if peak > 0.0 {
                max_drawdown_pct = max_drawdown_pct.max((peak - point.value) / peak * 100.0);
            }
        }

        let impermanent_loss_pct = match self.replayer.pool() {
            Some(pool) if self.capital_deployed => {
                let hodl = quote_value(
                    U256::from(self.initial_amount0),
                    U256::from(self.initial_amount1),
                    pool.sqrt_price_x96,
                )
                .map_err(|e| anyhow!("hodl valuation failed: {e:?}"))?;
                let hodl = u128::try_from(hodl).unwrap_or(u128::MAX) as f64;
                let lp_excl_fees = final_value.saturating_sub(fees_earned) as f64;
                crate::valuation::impermanent_loss(lp_excl_fees, hodl) * 100.0
            }
            _ => 0.0,
        };

        let mut warnings: Vec<String> = self
            .replayer
            .ledger
            .iter()
            .map(|d| {
                format!(
                    "ts {} block {}: {}{}",
                    d.timestamp,
                    d.block_number,
                    d.detail,
                    if d.skipped { " (skipped)" } else { "" }
                )
            })
            .collect();
        if self.dropped_actions > 0 {
            warnings.push(format!(
                "{} strategy action(s) dropped on failed preconditions",
                self.dropped_actions
            ));
        }

        let summary = RunSummary {
            strategy: self.strategy.name().to_string(),
            events_processed: events.len(),
            swaps: self.replayer.counts.swaps,
            mints: self.replayer.counts.mints,
            burns: self.replayer.counts.burns,
            initial_capital_quote: initial,
            final_value_quote: final_value,
            total_return_pct,
            max_drawdown_pct,
            rebalance_count: self.rebalance_count,
            gas_spent_quote: self.gas_spent_quote,
            fees_earned_quote: fees_earned,
            impermanent_loss_pct,
            first_timestamp: events.first().map(|e| e.block_timestamp()),
            last_timestamp: events.last().map(|e| e.block_timestamp()),
            discrepancies: self.replayer.ledger.len(),
            skipped_events: self.replayer.counts.skipped,
            dropped_actions: self.dropped_actions,
        };

        info!(
            final_value = summary.final_value_quote,
            return_pct = summary.total_return_pct,
            rebalances = summary.rebalance_count,
            "backtest finished"
        );

        Ok(BacktestResult {
            value_series: self.value_series,
            price_series: self.price_series,
            actions: self.actions,
            summary,
            warnings,
        })
    }
}
