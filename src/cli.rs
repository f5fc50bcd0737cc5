use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{BacktestConfig, StrategyKind};
use crate::driver::BacktestDriver;
use crate::events::{read_events, stream_stats, EventFilter};
use crate::report;

#[derive(Parser, Debug)]
#[command(name = "clamm-backtest")]
#[command(about = "Historical backtester for concentrated-liquidity AMM strategies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay an event stream and backtest one strategy against it
    Run {
        /// Path to the JSONL pool event stream
        #[arg(long)]
        data: PathBuf,

        /// Strategy to run
        #[arg(long, value_enum, default_value = "passive_range")]
        strategy: StrategyKind,

        /// Initial capital in raw token1 units
        #[arg(long, default_value_t = 10_000_000_000)]
        initial_capital: u64,

        /// Inclusive timestamp window
        #[arg(long)]
        start_timestamp: Option<i64>,
        #[arg(long)]
        end_timestamp: Option<i64>,

        /// Inclusive block window
        #[arg(long)]
        start_block: Option<u64>,
        #[arg(long)]
        end_block: Option<u64>,

        /// Passive range width as a fraction (0.10 = +/-10%)
        #[arg(long, default_value_t = 0.10)]
        price_range_pct: f64,

        /// Explicit range override for the passive strategy
        #[arg(long)]
        tick_lower: Option<i32>,
        #[arg(long)]
        tick_upper: Option<i32>,

        /// ATR strategy parameters
        #[arg(long, default_value_t = 14)]
        atr_period: usize,
        #[arg(long, default_value_t = 2.0)]
        atr_multiplier: f64,
        #[arg(long, default_value_t = 180)]
        rebalance_interval_s: i64,
        #[arg(long, default_value_t = 0.03)]
        deviation_threshold: f64,

        /// Dual-order strategy parameters
        #[arg(long, default_value_t = 600)]
        base_threshold: i32,
        #[arg(long, default_value_t = 1200)]
        limit_threshold: i32,
        #[arg(long, default_value_t = 172_800)]
        alpha_rebalance_interval_s: i64,

        /// Fixed-width strategy parameters
        #[arg(long, default_value_t = 600)]
        position_width_ticks: i32,
        #[arg(long, default_value_t = 500)]
        rebalance_threshold_bps: u32,

        /// Bollinger strategy parameters
        #[arg(long, default_value_t = 20)]
        sma_period: usize,
        #[arg(long, default_value_t = 2.0)]
        std_multiplier: f64,
        #[arg(long, default_value_t = 120)]
        min_width_ticks: i32,

        /// Rebalance friction in bps of the repositioned notional
        #[arg(long, default_value_t = 100)]
        rebalance_cost_bps: u32,

        /// Pool parameters
        #[arg(long, default_value_t = 3000)]
        fee_tier: u32,
        #[arg(long, default_value_t = 60)]
        tick_spacing: i32,
        #[arg(long, default_value_t = 8)]
        decimals0: u8,
        #[arg(long, default_value_t = 6)]
        decimals1: u8,

        /// Indicator bar width in seconds
        #[arg(long, default_value_t = 60)]
        bar_interval_s: i64,

        /// Directory for CSV/JSON artifacts
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Print per-type counts and coverage of an event stream
    Stats {
        /// Path to the JSONL pool event stream
        #[arg(long)]
        data: PathBuf,
    },
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Run {
            data,
            strategy,
            initial_capital,
            start_timestamp,
            end_timestamp,
            start_block,
            end_block,
            price_range_pct,
            tick_lower,
            tick_upper,
            atr_period,
            atr_multiplier,
            rebalance_interval_s,
            deviation_threshold,
            base_threshold,
            limit_threshold,
            alpha_rebalance_interval_s,
            position_width_ticks,
            rebalance_threshold_bps,
            sma_period,
            std_multiplier,
            min_width_ticks,
            rebalance_cost_bps,
            fee_tier,
            tick_spacing,
            decimals0,
            decimals1,
            bar_interval_s,
            output_dir,
        } => {
            let config = BacktestConfig {
                data_path: data,
                initial_capital_quote: initial_capital as u128,
                start_timestamp,
                end_timestamp,
                start_block,
                end_block,
                strategy,
                price_range_pct,
                tick_lower,
                tick_upper,
                atr_period,
                atr_multiplier,
                rebalance_interval_s,
                deviation_threshold,
                base_threshold,
                limit_threshold,
                alpha_rebalance_interval_s,
                position_width_ticks,
                rebalance_threshold_bps,
                sma_period,
                std_multiplier,
                min_width_ticks,
                rebalance_cost_bps,
                fee_tier,
                tick_spacing,
                decimals0,
                decimals1,
                bar_interval_s,
            };
            run_backtest(config, &output_dir)
        }
        Commands::Stats { data } => run_stats(&data),
    }
}

fn run_backtest(config: BacktestConfig, output_dir: &std::path::Path) -> Result<()> {
    let decimals1 = config.decimals1;
    let result = BacktestDriver::new(config).run().context("backtest run")?;

    let paths = report::write_artifacts(&result, output_dir).context("writing artifacts")?;
    println!(
        "{}",
        report::render_summary(&result.summary, &result.warnings, decimals1)
    );
    info!(
        value_csv = %paths.value_csv.display(),
        price_csv = %paths.price_csv.display(),
        actions_csv = %paths.actions_csv.display(),
        metrics_json = %paths.metrics_json.display(),
        "artifacts written"
    );
    Ok(())
}

fn run_stats(data: &std::path::Path) -> Result<()> {
    let records = read_events(data, &EventFilter::default()).context("reading event stream")?;
    let stats = stream_stats(&records);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
