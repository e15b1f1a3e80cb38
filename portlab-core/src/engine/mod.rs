//! Backtesting engine: a one-pass state machine over the trading calendar.
//!
//! `NotStarted -> Running -> Completed`, or `Failed` on the first fatal error.
//! A failed run keeps every record appended before the failure.

pub mod backtester;
pub mod state;
pub mod trade_stats;

pub use backtester::{run_backtest, Backtester};
pub use state::{
    EngineConfig, HoldingPolicy, PerformanceRecord, RunFailure, RunResult, RunState,
};
pub use trade_stats::TradeStats;
