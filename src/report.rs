//! Renders a finished run into its artifacts: three CSV tables, a JSON
//! metrics record, and a human-readable summary.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::DateTime;

use crate::driver::{BacktestResult, RunSummary, TimeSeriesPoint, ValuePoint};

pub struct ReportPaths {
    pub value_csv: PathBuf,
    pub price_csv: PathBuf,
    pub actions_csv: PathBuf,
    pub metrics_json: PathBuf,
}

/// Writes all artifacts under `output_dir`, creating it as needed.
pub fn write_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<ReportPaths> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output dir {}", output_dir.display()))?;

    let paths = ReportPaths {
        value_csv: output_dir.join("value_history.csv"),
        price_csv: output_dir.join("price_history.csv"),
        actions_csv: output_dir.join("actions.csv"),
        metrics_json: output_dir.join("metrics.json"),
    };

    write_value_csv(&paths.value_csv, &result.value_series)?;
    write_series_csv(&paths.price_csv, &result.price_series, "price")?;
    write_actions_csv(&paths.actions_csv, result)?;

    let metrics = serde_json::json!({
        "summary": result.summary,
        "warnings": result.warnings,
    });
    fs::write(&paths.metrics_json, serde_json::to_string_pretty(&metrics)?)
        .with_context(|| format!("writing {}", paths.metrics_json.display()))?;

    Ok(paths)
}

fn write_value_csv(path: &Path, series: &[ValuePoint]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([
        "timestamp",
        "datetime",
        "value_quote",
        "tick_lower",
        "tick_upper",
        "fees_accum_quote",
    ])?;
    for point in series {
        writer.write_record([
            point.timestamp.to_string(),
            format_timestamp(point.timestamp),
            format!("{:.6}", point.value),
            point.tick_lower.map(|t| t.to_string()).unwrap_or_default(),
            point.tick_upper.map(|t| t.to_string()).unwrap_or_default(),
            point.fees_accum_quote.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_series_csv(path: &Path, series: &[TimeSeriesPoint], column: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["timestamp", "datetime", column])?;
    for point in series {
        writer.write_record([
            point.timestamp.to_string(),
            format_timestamp(point.timestamp),
            format!("{:.6}", point.value),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_actions_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["timestamp", "action", "tick_lower", "tick_upper", "executed"])?;
    for action in &result.actions {
        writer.write_record([
            action.timestamp.to_string(),
            action.kind.to_string(),
            action.tick_lower.to_string(),
            action.tick_upper.to_string(),
            action.executed.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// The printed end-of-run report.
pub fn render_summary(summary: &RunSummary, warnings: &[String], decimals1: u8) -> String {
    let scale = 10_f64.powi(decimals1 as i32);
    let mut out = String::new();
    let _ = writeln!(out, "strategy:          {}", summary.strategy);
    let _ = writeln!(
        out,
        "events:            {} ({} swaps, {} mints, {} burns)",
        summary.events_processed, summary.swaps, summary.mints, summary.burns
    );
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        let _ = writeln!(
            out,
            "window:            {} .. {}",
            format_timestamp(first),
            format_timestamp(last)
        );
    }
    let _ = writeln!(
        out,
        "initial capital:   {:.2}",
        summary.initial_capital_quote as f64 / scale
    );
    let _ = writeln!(
        out,
        "final value:       {:.2}",
        summary.final_value_quote as f64 / scale
    );
    let _ = writeln!(out, "total return:      {:+.2}%", summary.total_return_pct);
    let _ = writeln!(out, "max drawdown:      {:.2}%", summary.max_drawdown_pct);
    let _ = writeln!(
        out,
        "fees earned:       {:.2}",
        summary.fees_earned_quote as f64 / scale
    );
    let _ = writeln!(
        out,
        "impermanent loss:  {:+.2}%",
        summary.impermanent_loss_pct
    );
    let _ = writeln!(out, "rebalances:        {}", summary.rebalance_count);
    let _ = writeln!(
        out,
        "rebalance cost:    {:.2}",
        summary.gas_spent_quote as f64 / scale
    );

    if summary.discrepancies > 0 || summary.dropped_actions > 0 {
        let _ = writeln!(out, "\nwarnings:");
        let _ = writeln!(
            out,
            "  {} replay discrepancies ({} events skipped), {} dropped actions",
            summary.discrepancies, summary.skipped_events, summary.dropped_actions
        );
        for warning in warnings.iter().take(20) {
            let _ = writeln!(out, "  - {warning}");
        }
        if warnings.len() > 20 {
            let _ = writeln!(out, "  ... and {} more", warnings.len() - 20);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ActionRecord;

    fn sample_result() -> BacktestResult {
        BacktestResult {
            value_series: vec![
                ValuePoint {
                    timestamp: 1_700_000_000,
                    value: 10_000_000_000.0,
                    tick_lower: Some(69000),
                    tick_upper: Some(72000),
                    fees_accum_quote: 0,
                },
                ValuePoint {
                    timestamp: 1_700_000_060,
                    value: 10_050_000_000.0,
                    tick_lower: Some(69000),
                    tick_upper: Some(72000),
                    fees_accum_quote: 1_234,
                },
            ],
            price_series: vec![TimeSeriesPoint {
                timestamp: 1_700_000_000,
                value: 109_000.0,
            }],
            actions: vec![ActionRecord {
                timestamp: 1_700_000_000,
                kind: "open",
                tick_lower: 69000,
                tick_upper: 72000,
                executed: true,
            }],
            summary: RunSummary {
                strategy: "passive_range".into(),
                events_processed: 2,
                initial_capital_quote: 10_000_000_000,
                final_value_quote: 10_050_000_000,
                total_return_pct: 0.5,
                ..Default::default()
            },
            warnings: vec![],
        }
    }

    #[test]
    fn writes_all_artifacts() {
        let dir = std::env::temp_dir().join("clamm_backtest_report_test");
        let _ = fs::remove_dir_all(&dir);
        let paths = write_artifacts(&sample_result(), &dir).unwrap();

        let value_csv = fs::read_to_string(&paths.value_csv).unwrap();
        assert!(value_csv.starts_with("timestamp,datetime,value_quote"));
        assert_eq!(value_csv.lines().count(), 3);

        let metrics = fs::read_to_string(&paths.metrics_json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&metrics).unwrap();
        assert_eq!(parsed["summary"]["strategy"], "passive_range");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn summary_renders_in_display_units() {
        let result = sample_result();
        let text = render_summary(&result.summary, &result.warnings, 6);
        assert!(text.contains("initial capital:   10000.00"));
        assert!(text.contains("total return:      +0.50%"));
        assert!(!text.contains("warnings:"));
    }
}
