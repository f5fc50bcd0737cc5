use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which policy the driver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Hold the initial 50/50 token split, no position.
    Hold,
    /// One passive position over a configured price range.
    PassiveRange,
    /// ATR-sized dynamic range.
    Atr,
    /// Passive dual-order vault (base + limit order, no swaps).
    AlphaVault,
    /// Fixed tick width, recentered on drift.
    FixedWidth,
    /// Bollinger-band range.
    Bollinger,
}

/// One immutable record of everything a run depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub data_path: PathBuf,
    /// Starting capital in raw token1 units.
    pub initial_capital_quote: u128,
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
    pub strategy: StrategyKind,

    /// Width of the passive range, as a price fraction.
    pub price_range_pct: f64,
    /// Explicit range override for the passive strategy.
    pub tick_lower: Option<i32>,
    pub tick_upper: Option<i32>,

    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub rebalance_interval_s: i64,
    pub deviation_threshold: f64,

    pub base_threshold: i32,
    pub limit_threshold: i32,
    pub alpha_rebalance_interval_s: i64,

    pub position_width_ticks: i32,
    pub rebalance_threshold_bps: u32,

    pub sma_period: usize,
    pub std_multiplier: f64,
    pub min_width_ticks: i32,

    /// Flat friction charged on the notional repositioned by a rebalance.
    pub rebalance_cost_bps: u32,

    pub fee_tier: u32,
    pub tick_spacing: i32,
    /// Token decimals, display only.
    pub decimals0: u8,
    pub decimals1: u8,

    /// Width of the indicator bars in seconds.
    pub bar_interval_s: i64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/pool_events.jsonl"),
            // 10,000 quote tokens at 6 decimals.
            initial_capital_quote: 10_000_000_000,
            start_timestamp: None,
            end_timestamp: None,
            start_block: None,
            end_block: None,
            strategy: StrategyKind::PassiveRange,
            price_range_pct: 0.10,
            tick_lower: None,
            tick_upper: None,
            atr_period: 14,
            atr_multiplier: 2.0,
            rebalance_interval_s: 180,
            deviation_threshold: 0.03,
            base_threshold: 600,
            limit_threshold: 1200,
            alpha_rebalance_interval_s: 172_800,
            position_width_ticks: 600,
            rebalance_threshold_bps: 500,
            sma_period: 20,
            std_multiplier: 2.0,
            min_width_ticks: 120,
            rebalance_cost_bps: 100,
            fee_tier: 3000,
            tick_spacing: 60,
            decimals0: 8,
            decimals1: 6,
            bar_interval_s: 60,
        }
    }
}

impl BacktestConfig {
    pub fn explicit_range(&self) -> Option<(i32, i32)> {
        match (self.tick_lower, self.tick_upper) {
            (Some(lower), Some(upper)) => Some((lower, upper)),
            _ => None,
        }
    }

    pub fn event_filter(&self) -> crate::events::EventFilter {
        crate::events::EventFilter {
            start_timestamp: self.start_timestamp,
            end_timestamp: self.end_timestamp,
            start_block: self.start_block,
            end_block: self.end_block,
        }
    }
}
