//! PortLab Runner: orchestration around the core engine.
//!
//! This crate builds on `portlab-core` to provide:
//! - Backtest results with cached statistics
//! - Pure performance and tail-risk metrics
//! - Multi-run comparison on an inner-joined date index
//! - Batch runs on a bounded worker pool with cancellation of pending jobs
//! - TOML experiment configuration and content-addressed run ids
//! - CSV and synthetic dataset loading, artifact export

pub mod batch;
pub mod compare;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod result;
pub mod runner;

pub use batch::{run_batch, BatchOptions, BatchOutcome};
pub use compare::{compare, CompareError, Comparison, ComparisonEntry};
pub use config::{ExperimentConfig, ExperimentError, LabeledStrategy, StatisticsConfig};
pub use data_loader::{
    dataset_fingerprint, load_csv_dataset, load_long_csv, synthetic_dataset, LoadError,
};
pub use metrics::Drawdown;
pub use result::{BacktestResult, Statistics, SCHEMA_VERSION};
pub use runner::{run_single, RunError, RunJob};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn batch_types_are_send_sync() {
        assert_send::<RunJob>();
        assert_sync::<RunJob>();
        assert_send::<BatchOutcome>();
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_sync::<BatchOptions<'static>>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<ExperimentConfig>();
        assert_sync::<ExperimentConfig>();
        assert_send::<StatisticsConfig>();
        assert_sync::<StatisticsConfig>();
    }
}
