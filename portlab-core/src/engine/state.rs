//! Engine configuration, lifecycle state, and run output types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::RebalanceFrequency;
use crate::cost::{check_rate, CostModel};
use crate::error::{ConfigError, EngineError};
use crate::overlay::VolatilityTarget;
use crate::weights::{WeightVector, WeightingScheme};

use super::trade_stats::TradeStats;

/// What happens to weights between rebalancing dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingPolicy {
    /// Buy and hold: weights drift with realized returns.
    #[default]
    Drift,
    /// Weights stay at the last target every session, with no extra cost.
    Fixed,
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rebalancing_frequency: RebalanceFrequency,
    pub transaction_cost_rate: f64,
    pub slippage_rate: f64,
    /// Annual rate, used by downstream statistics.
    pub risk_free_rate: f64,
    /// Annualized volatility target. `None` disables the overlay.
    pub vol_target: Option<f64>,
    pub vol_lookback: usize,
    pub max_leverage: f64,
    pub weighting_scheme: WeightingScheme,
    /// Leading calendar sessions skipped as warm-up.
    pub special_start_offset: usize,
    pub initial_equity: f64,
    pub periods_per_year: f64,
    pub holding: HoldingPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rebalancing_frequency: RebalanceFrequency::Monthly,
            transaction_cost_rate: 0.0,
            slippage_rate: 0.0,
            risk_free_rate: 0.0,
            vol_target: None,
            vol_lookback: 20,
            max_leverage: 1.0,
            weighting_scheme: WeightingScheme::StrategyDefined,
            special_start_offset: 0,
            initial_equity: 1.0,
            periods_per_year: 252.0,
            holding: HoldingPolicy::Drift,
        }
    }
}

impl EngineConfig {
    /// Reject invalid or contradictory settings before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rebalancing_frequency.validate()?;
        check_rate("transaction_cost_rate", self.transaction_cost_rate)?;
        check_rate("slippage_rate", self.slippage_rate)?;
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::InvalidRiskFreeRate(self.risk_free_rate));
        }
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(ConfigError::InvalidInitialEquity(self.initial_equity));
        }
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(ConfigError::InvalidPeriodsPerYear(self.periods_per_year));
        }
        self.vol_overlay()?;
        Ok(())
    }

    pub fn cost_model(&self) -> Result<CostModel, ConfigError> {
        CostModel::new(self.transaction_cost_rate, self.slippage_rate)
    }

    /// The volatility overlay, when enabled.
    pub fn vol_overlay(&self) -> Result<Option<VolatilityTarget>, ConfigError> {
        self.vol_target
            .map(|target| {
                VolatilityTarget::new(
                    target,
                    self.vol_lookback,
                    self.max_leverage,
                    self.periods_per_year,
                )
            })
            .transpose()
    }
}

/// Backtester lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// One entry per simulated session, appended in calendar order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    /// Weights held at the close of the session.
    pub weights: WeightVector,
    /// Net return for the session (after cost drag).
    pub portfolio_return: f64,
    /// Return before cost drag.
    pub gross_return: f64,
    /// Turnover of the rebalance on this session, 0 otherwise.
    pub turnover: f64,
    /// Cost drag charged on this session.
    pub cost: f64,
    pub equity: f64,
    pub rebalanced: bool,
    /// Volatility overlay scale in force (1.0 without an overlay).
    pub leverage: f64,
}

/// Output of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub strategy: String,
    pub records: Vec<PerformanceRecord>,
    pub initial_equity: f64,
    pub trade_stats: TradeStats,
    /// Rebalances where the overlay lacked history and weights stayed unscaled.
    pub vol_fallbacks: usize,
    /// Calendar sessions skipped before the first allocation.
    pub warmup_sessions: usize,
}

impl RunResult {
    pub fn final_equity(&self) -> f64 {
        self.records
            .last()
            .map(|r| r.equity)
            .unwrap_or(self.initial_equity)
    }

    pub fn returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.portfolio_return).collect()
    }
}

/// A run that ended in `Failed`, with every record appended before the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub error: EngineError,
    pub records: Vec<PerformanceRecord>,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} records kept)", self.error, self.records.len())
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ConfigError> for RunFailure {
    fn from(err: ConfigError) -> Self {
        Self {
            error: EngineError::Config(err),
            records: Vec::new(),
        }
    }
}
