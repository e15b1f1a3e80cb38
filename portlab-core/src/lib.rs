//! PortLab Core: portfolio backtesting engine.
//!
//! - Price data model with causally-bounded windows
//! - Trading calendar and rebalancing schedules
//! - Strategy trait, built-in allocation strategies and their factory
//! - Cost model and volatility-targeting overlay
//! - Session-by-session backtester with append-only performance records

pub mod calendar;
pub mod cost;
pub mod data;
pub mod engine;
pub mod error;
pub mod numeric;
pub mod overlay;
pub mod strategies;
pub mod weights;

pub use calendar::{RebalanceFrequency, TradingCalendar};
pub use cost::{CostCharge, CostModel};
pub use data::{PriceDataset, PriceWindow};
pub use engine::{
    run_backtest, Backtester, EngineConfig, HoldingPolicy, PerformanceRecord, RunFailure,
    RunResult, RunState,
};
pub use error::{ConfigError, EngineError, StrategyError, WindowError};
pub use overlay::VolatilityTarget;
pub use strategies::{Strategy, StrategySpec};
pub use weights::{ExposureContract, GrossExposure, WeightVector, WeightingScheme};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across batch worker threads is
    /// Send + Sync, and built strategies can move into a worker.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PriceDataset>();
        require_sync::<PriceDataset>();
        require_send::<TradingCalendar>();
        require_sync::<TradingCalendar>();
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<StrategySpec>();
        require_sync::<StrategySpec>();
        require_send::<RunResult>();
        require_sync::<RunResult>();
        require_send::<RunFailure>();
        require_sync::<RunFailure>();
        require_send::<Box<dyn Strategy>>();
    }
}
