//! Artifact export: records CSV, summary JSON and full result JSON.
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected on
//! load.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use portlab_core::engine::{EngineConfig, TradeStats};
use portlab_core::strategies::StrategySpec;

use crate::compare::Comparison;
use crate::result::{BacktestResult, Statistics, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a full `BacktestResult` (records included) to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Run metadata plus statistics, without the record sequence.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub schema_version: u32,
    pub run_id: &'a str,
    pub label: &'a str,
    pub strategy: &'a str,
    pub spec: &'a StrategySpec,
    pub engine: &'a EngineConfig,
    pub dataset_hash: &'a str,
    pub warmup_sessions: usize,
    pub vol_fallbacks: usize,
    pub trade_stats: &'a TradeStats,
    pub statistics: &'a Statistics,
}

impl<'a> RunSummary<'a> {
    pub fn new(result: &'a BacktestResult) -> Self {
        Self {
            schema_version: result.schema_version,
            run_id: &result.run_id,
            label: &result.label,
            strategy: &result.strategy,
            spec: &result.spec,
            engine: &result.engine,
            dataset_hash: &result.dataset_hash,
            warmup_sessions: result.warmup_sessions,
            vol_fallbacks: result.vol_fallbacks,
            trade_stats: &result.trade_stats,
            statistics: result.statistics(),
        }
    }
}

pub fn export_summary_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(&RunSummary::new(result))
        .context("failed to serialize run summary to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the record sequence as CSV.
///
/// Columns: date, portfolio_return, gross_return, turnover, cost, equity,
/// leverage, rebalanced, then one `w_<asset>` column per asset ever held.
pub fn export_records_csv(result: &BacktestResult) -> Result<String> {
    let assets: BTreeSet<&str> = result
        .records()
        .iter()
        .flat_map(|r| r.weights.assets())
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header: Vec<String> = [
        "date",
        "portfolio_return",
        "gross_return",
        "turnover",
        "cost",
        "equity",
        "leverage",
        "rebalanced",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(assets.iter().map(|a| format!("w_{a}")));
    wtr.write_record(&header)?;

    for r in result.records() {
        let mut row = vec![
            r.date.to_string(),
            format!("{:.10}", r.portfolio_return),
            format!("{:.10}", r.gross_return),
            format!("{:.10}", r.turnover),
            format!("{:.10}", r.cost),
            format!("{:.10}", r.equity),
            format!("{:.6}", r.leverage),
            r.rebalanced.to_string(),
        ];
        row.extend(assets.iter().map(|a| format!("{:.10}", r.weights.get(a))));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export a comparison as one CSV row per run.
pub fn export_comparison_csv(comparison: &Comparison) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "label",
        "strategy",
        "excluded_dates",
        "total_return",
        "annualized_return",
        "annualized_volatility",
        "sharpe",
        "max_drawdown",
        "var",
        "excess_return",
        "tracking_error",
        "information_ratio",
    ])?;
    for e in &comparison.entries {
        let s = &e.statistics;
        wtr.write_record([
            e.label.clone(),
            e.strategy.clone(),
            e.excluded_dates.to_string(),
            format!("{:.6}", s.total_return),
            format!("{:.6}", s.annualized_return),
            format!("{:.6}", s.annualized_volatility),
            format!("{:.4}", s.sharpe),
            format!("{:.6}", s.max_drawdown.depth),
            format!("{:.6}", s.var),
            format!("{:.6}", e.excess_return),
            format!("{:.6}", e.tracking_error),
            e.information_ratio
                .map(|ir| format!("{ir:.4}"))
                .unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact directory ─────────────────────────────────────────────

/// Write `result.json`, `summary.json` and `records.csv` under
/// `output_dir/<label>_<run id prefix>/`. Returns the run directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let label: String = result
        .label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let prefix = result.run_id.get(..12).unwrap_or(&result.run_id);
    let run_dir = output_dir.join(format!("{label}_{prefix}"));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("summary.json"), export_summary_json(result)?)?;
    std::fs::write(run_dir.join("records.csv"), export_records_csv(result)?)?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
