//! Session-by-session simulation loop.
//!
//! For each calendar session in the horizon:
//! 1. Realize per-asset returns since the previous session on the weights held
//!    over that period, and drift those weights (or keep them fixed).
//! 2. On a rebalancing date, ask the strategy for target weights from a window
//!    ending at the session, validate them, apply the weighting scheme and the
//!    volatility overlay, and charge cost on the turnover from the drifted
//!    weights.
//! 3. Append a `PerformanceRecord` and update equity.
//!
//! The first session of the horizon is always a rebalance from cash and has no
//! realized return.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, error, info, info_span, warn};

use crate::calendar::TradingCalendar;
use crate::cost::{CostCharge, CostModel};
use crate::data::{PriceDataset, PriceWindow};
use crate::error::{ConfigError, EngineError, WindowError};
use crate::overlay::VolatilityTarget;
use crate::strategies::Strategy;
use crate::weights::WeightVector;

use super::state::{
    EngineConfig, HoldingPolicy, PerformanceRecord, RunFailure, RunResult, RunState,
};
use super::trade_stats::TradeTracker;

pub struct Backtester<'a> {
    dataset: &'a PriceDataset,
    calendar: &'a TradingCalendar,
    strategy: Box<dyn Strategy>,
    config: EngineConfig,
    cost: CostModel,
    overlay: Option<VolatilityTarget>,
    /// Dataset row of each calendar session.
    rows: Vec<usize>,
    /// First calendar index of the horizon.
    start: usize,
    state: RunState,
}

/// Mutable state carried across sessions of one run.
struct LoopState {
    held: WeightVector,
    equity: f64,
    leverage: f64,
    records: Vec<PerformanceRecord>,
    trades: TradeTracker,
    vol_fallbacks: usize,
}

/// Outcome of a rebalancing decision before cost is charged.
struct Rebalance {
    target: WeightVector,
    /// Weights before the volatility overlay; trades are scored on these.
    positions: WeightVector,
    leverage: f64,
}

impl<'a> Backtester<'a> {
    /// Validate the configuration against the dataset and calendar.
    ///
    /// The horizon starts at `special_start_offset`, pushed later if needed so
    /// the first window satisfies the strategy's minimum history.
    pub fn new(
        dataset: &'a PriceDataset,
        calendar: &'a TradingCalendar,
        strategy: Box<dyn Strategy>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cost = config.cost_model()?;
        let overlay = config.vol_overlay()?;

        if calendar.is_empty() {
            return Err(ConfigError::EmptyCalendar);
        }
        let rows = calendar
            .sessions()
            .iter()
            .map(|d| dataset.position(*d).ok_or(ConfigError::SessionNotInDataset(*d)))
            .collect::<Result<Vec<_>, _>>()?;

        let offset = config.special_start_offset;
        if offset >= rows.len() {
            return Err(ConfigError::OffsetBeyondHorizon {
                offset,
                sessions: rows.len(),
            });
        }
        let min_rows = strategy.min_history().max(1);
        let start = (offset..rows.len())
            .find(|&i| rows[i] + 1 >= min_rows)
            .ok_or(ConfigError::OffsetBeyondHorizon {
                offset: rows.len(),
                sessions: rows.len(),
            })?;

        Ok(Self {
            dataset,
            calendar,
            strategy,
            config,
            cost,
            overlay,
            rows,
            start,
            state: RunState::NotStarted,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Calendar sessions skipped before the first allocation.
    pub fn warmup_sessions(&self) -> usize {
        self.start
    }

    /// Run the simulation once. A second call fails with `AlreadyRun`.
    pub fn run(&mut self) -> Result<RunResult, RunFailure> {
        if self.state != RunState::NotStarted {
            return Err(RunFailure {
                error: EngineError::AlreadyRun(self.state),
                records: Vec::new(),
            });
        }
        self.state = RunState::Running;

        let name = self.strategy.name().to_string();
        let span = info_span!("backtest", strategy = %name);
        let _guard = span.enter();

        let sessions = self.calendar.sessions();
        info!(
            sessions = sessions.len() - self.start,
            warmup = self.start,
            first = %sessions[self.start],
            "backtest started"
        );

        let mut st = LoopState {
            held: WeightVector::new(),
            equity: self.config.initial_equity,
            leverage: 1.0,
            records: Vec::with_capacity(sessions.len() - self.start),
            trades: TradeTracker::default(),
            vol_fallbacks: 0,
        };

        match self.simulate(&mut st) {
            Ok(()) => {
                self.state = RunState::Completed;
                info!(
                    records = st.records.len(),
                    final_equity = st.equity,
                    vol_fallbacks = st.vol_fallbacks,
                    "backtest completed"
                );
                Ok(RunResult {
                    strategy: name,
                    records: st.records,
                    initial_equity: self.config.initial_equity,
                    trade_stats: st.trades.finish(),
                    vol_fallbacks: st.vol_fallbacks,
                    warmup_sessions: self.start,
                })
            }
            Err(err) => {
                self.state = RunState::Failed;
                error!(error = %err, records = st.records.len(), "backtest failed");
                Err(RunFailure {
                    error: err,
                    records: st.records,
                })
            }
        }
    }

    fn simulate(&mut self, st: &mut LoopState) -> Result<(), EngineError> {
        let sessions = self.calendar.sessions();
        let mask = self
            .calendar
            .rebalancing_mask(self.config.rebalancing_frequency, sessions[self.start]);

        for i in self.start..sessions.len() {
            let date = sessions[i];
            let row = self.rows[i];
            let first = i == self.start;

            // ─── Realize returns on the weights held over the period ───
            let (gross_return, drifted) = if first {
                (0.0, WeightVector::new())
            } else {
                let returns = self.realized_returns(&st.held, self.rows[i - 1], row, date)?;
                let gross = st.held.portfolio_return(&returns);
                let drifted = match self.config.holding {
                    HoldingPolicy::Drift => st.held.drifted(&returns),
                    HoldingPolicy::Fixed => st.held.clone(),
                };
                (gross, drifted)
            };

            // ─── Rebalance ───
            let rebalanced = first || mask[i];
            let (weights, charge) = if rebalanced {
                let window = self.dataset.window(row);
                let prior = (!first).then_some(&drifted);
                let decision = self.rebalance(&window, prior, st)?;
                let charge = self.cost.apply(&drifted, &decision.target);
                st.leverage = decision.leverage;
                st.trades.on_rebalance(&decision.positions, |asset| {
                    window.last_close(asset).ok()
                });
                debug!(
                    %date,
                    turnover = charge.turnover,
                    cost = charge.drag,
                    leverage = decision.leverage,
                    gross = decision.target.gross_exposure(),
                    "rebalanced"
                );
                (decision.target, charge)
            } else {
                (drifted, CostCharge::default())
            };

            // ─── Accounting ───
            let portfolio_return = gross_return - charge.drag;
            st.equity *= 1.0 + portfolio_return;
            st.records.push(PerformanceRecord {
                date,
                weights: weights.clone(),
                portfolio_return,
                gross_return,
                turnover: charge.turnover,
                cost: charge.drag,
                equity: st.equity,
                rebalanced,
                leverage: st.leverage,
            });
            st.held = weights;
        }
        Ok(())
    }

    /// Close-to-close returns between two dataset rows for every held asset.
    fn realized_returns(
        &self,
        held: &WeightVector,
        prev_row: usize,
        row: usize,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, f64>, EngineError> {
        let mut returns = BTreeMap::new();
        for (asset, w) in held.iter() {
            if w == 0.0 {
                continue;
            }
            let closes = self
                .dataset
                .closes(asset)
                .ok_or_else(|| EngineError::UnknownAsset {
                    date,
                    asset: asset.to_string(),
                })?;
            let (p0, p1) = (closes[prev_row], closes[row]);
            if !(p0.is_finite() && p1.is_finite()) || p0 == 0.0 {
                return Err(EngineError::MissingData {
                    date,
                    asset: asset.to_string(),
                });
            }
            returns.insert(asset.to_string(), p1 / p0 - 1.0);
        }
        Ok(returns)
    }

    /// Strategy call, validation, weighting scheme and overlay for one rebalance.
    fn rebalance(
        &mut self,
        window: &PriceWindow<'_>,
        prior: Option<&WeightVector>,
        st: &mut LoopState,
    ) -> Result<Rebalance, EngineError> {
        let date = window.as_of();
        let raw = self
            .strategy
            .compute_weights(window, prior)
            .map_err(|source| EngineError::Strategy {
                date,
                strategy: self.strategy.name().to_string(),
                source,
            })?;

        self.strategy
            .exposure()
            .check(&raw)
            .map_err(|reason| EngineError::MalformedWeights {
                date,
                strategy: self.strategy.name().to_string(),
                reason,
            })?;

        for (asset, w) in raw.iter() {
            if w == 0.0 {
                continue;
            }
            if !window.has_asset(asset) {
                return Err(EngineError::UnknownAsset {
                    date,
                    asset: asset.to_string(),
                });
            }
            window
                .last_close(asset)
                .map_err(|e| EngineError::from_window(date, e))?;
        }

        let weighted = self
            .config
            .weighting_scheme
            .apply(&raw, window)
            .map_err(|e| EngineError::from_window(date, e))?;

        let positions = weighted.without_zeros();
        let (target, leverage) = match &self.overlay {
            None => (weighted, 1.0),
            Some(overlay) => match overlay.scale(&weighted, window) {
                Ok(scaled) => (scaled.weights, scaled.leverage),
                Err(WindowError::InsufficientHistory {
                    required,
                    available,
                }) => {
                    warn!(
                        %date,
                        required,
                        available,
                        "volatility overlay lacks history, using unscaled weights"
                    );
                    st.vol_fallbacks += 1;
                    (weighted, 1.0)
                }
                Err(e) => return Err(EngineError::from_window(date, e)),
            },
        };

        Ok(Rebalance {
            target: target.without_zeros(),
            positions,
            leverage,
        })
    }
}

/// Build and run a backtester in one call.
pub fn run_backtest(
    dataset: &PriceDataset,
    calendar: &TradingCalendar,
    strategy: Box<dyn Strategy>,
    config: EngineConfig,
) -> Result<RunResult, RunFailure> {
    Backtester::new(dataset, calendar, strategy, config)?.run()
}
