//! Backtest result with lazily computed, never-invalidated statistics.
//!
//! A `BacktestResult` owns its performance records. Nothing mutates them after
//! construction: deriving a different view (for example the date-aligned
//! subset used by comparisons) goes through [`BacktestResult::with_records`],
//! which builds a new result with an empty statistics cache.

use std::sync::OnceLock;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use portlab_core::engine::{EngineConfig, PerformanceRecord, RunResult, TradeStats};
use portlab_core::strategies::StrategySpec;

use crate::config::{RunConfig, StatisticsConfig};
use crate::metrics::{self, Drawdown};

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

// ─── Statistics ─────────────────────────────────────────────────────

/// Summary statistics of a record sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub sessions: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: Drawdown,
    pub var_confidence: f64,
    /// Historical VaR as a per-session return (negative for a loss).
    pub var: f64,
    pub cvar: f64,
    pub total_turnover: f64,
    pub total_cost: f64,
    pub rebalance_count: usize,
    pub trade_count: usize,
    pub win_rate: Option<f64>,
}

impl Statistics {
    /// Compute every statistic from the records alone.
    ///
    /// The equity path is rebuilt by compounding record returns onto
    /// `initial_equity`, so a filtered record subset yields statistics of
    /// that subset rather than of the original curve.
    pub fn compute(
        records: &[PerformanceRecord],
        initial_equity: f64,
        engine: &EngineConfig,
        config: &StatisticsConfig,
        trades: &TradeStats,
    ) -> Self {
        let returns: Vec<f64> = records.iter().map(|r| r.portfolio_return).collect();
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        let curve = metrics::equity_curve(initial_equity, &returns);
        let final_equity = curve.last().copied().unwrap_or(initial_equity);
        let total_return = metrics::total_return(initial_equity, final_equity);
        let ppy = engine.periods_per_year;

        Self {
            sessions: records.len(),
            start_date: dates.first().copied(),
            end_date: dates.last().copied(),
            final_equity,
            total_return,
            annualized_return: metrics::annualized_return(total_return, returns.len(), ppy),
            annualized_volatility: metrics::annualized_volatility(&returns, ppy),
            sharpe: metrics::sharpe_ratio(&returns, engine.risk_free_rate, ppy),
            sortino: metrics::sortino_ratio(&returns, engine.risk_free_rate, ppy),
            max_drawdown: metrics::max_drawdown_from_start(initial_equity, &dates, &curve),
            var_confidence: config.var_confidence,
            var: metrics::historical_var(&returns, config.var_confidence),
            cvar: metrics::historical_cvar(&returns, config.var_confidence),
            total_turnover: records.iter().map(|r| r.turnover).sum(),
            total_cost: records.iter().map(|r| r.cost).sum(),
            rebalance_count: records.iter().filter(|r| r.rebalanced).count(),
            trade_count: trades.trades,
            win_rate: trades.win_rate(),
        }
    }
}

// ─── BacktestResult ─────────────────────────────────────────────────

/// Complete, immutable outcome of one labelled run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub label: String,
    /// Name reported by the built strategy.
    pub strategy: String,
    pub spec: StrategySpec,
    pub engine: EngineConfig,
    pub statistics_config: StatisticsConfig,
    pub dataset_hash: String,
    pub initial_equity: f64,
    pub trade_stats: TradeStats,
    pub vol_fallbacks: usize,
    pub warmup_sessions: usize,
    records: Vec<PerformanceRecord>,
    #[serde(skip)]
    statistics: OnceLock<Statistics>,
}

impl BacktestResult {
    /// Wrap a completed engine run with its provenance.
    pub fn from_run(
        label: impl Into<String>,
        spec: StrategySpec,
        engine: EngineConfig,
        statistics_config: StatisticsConfig,
        dataset_hash: impl Into<String>,
        run: RunResult,
    ) -> Self {
        let dataset_hash = dataset_hash.into();
        let run_id = RunConfig {
            spec: &spec,
            engine: &engine,
            statistics: &statistics_config,
            dataset_hash: &dataset_hash,
        }
        .run_id();
        Self {
            schema_version: SCHEMA_VERSION,
            run_id,
            label: label.into(),
            strategy: run.strategy,
            spec,
            engine,
            statistics_config,
            dataset_hash,
            initial_equity: run.initial_equity,
            trade_stats: run.trade_stats,
            vol_fallbacks: run.vol_fallbacks,
            warmup_sessions: run.warmup_sessions,
            records: run.records,
            statistics: OnceLock::new(),
        }
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    /// Statistics, computed on first access and cached for the lifetime of
    /// this value.
    pub fn statistics(&self) -> &Statistics {
        self.statistics.get_or_init(|| {
            Statistics::compute(
                &self.records,
                self.initial_equity,
                &self.engine,
                &self.statistics_config,
                &self.trade_stats,
            )
        })
    }

    /// A new result over `records` with the same provenance and a fresh cache.
    pub fn with_records(&self, records: Vec<PerformanceRecord>) -> Self {
        Self {
            records,
            statistics: OnceLock::new(),
            ..self.clone()
        }
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.portfolio_return).collect()
    }

    /// Equity after the last record, as reported by the engine.
    pub fn final_equity(&self) -> f64 {
        self.records
            .last()
            .map(|r| r.equity)
            .unwrap_or(self.initial_equity)
    }
}

impl PartialEq for BacktestResult {
    fn eq(&self, other: &Self) -> bool {
        self.schema_version == other.schema_version
            && self.run_id == other.run_id
            && self.label == other.label
            && self.strategy == other.strategy
            && self.spec == other.spec
            && self.engine == other.engine
            && self.statistics_config == other.statistics_config
            && self.dataset_hash == other.dataset_hash
            && self.initial_equity == other.initial_equity
            && self.trade_stats == other.trade_stats
            && self.vol_fallbacks == other.vol_fallbacks
            && self.warmup_sessions == other.warmup_sessions
            && self.records == other.records
    }
}
