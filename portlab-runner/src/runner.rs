//! Single-run entry point: wires a labelled job through the engine and wraps
//! the outcome as a `BacktestResult`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use portlab_core::calendar::TradingCalendar;
use portlab_core::data::PriceDataset;
use portlab_core::engine::{run_backtest, EngineConfig, RunFailure};
use portlab_core::error::ConfigError;
use portlab_core::strategies::StrategySpec;

use crate::config::StatisticsConfig;
use crate::data_loader::dataset_fingerprint;
use crate::result::BacktestResult;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("'{label}': invalid strategy: {source}")]
    Strategy {
        label: String,
        #[source]
        source: ConfigError,
    },

    #[error("'{label}': {failure}")]
    Failed {
        label: String,
        #[source]
        failure: RunFailure,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl RunError {
    /// Records appended before a failed run stopped.
    pub fn partial_records(&self) -> &[portlab_core::engine::PerformanceRecord] {
        match self {
            Self::Failed { failure, .. } => &failure.records,
            _ => &[],
        }
    }
}

/// One unit of work: a labelled strategy with its engine and statistics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJob {
    pub label: String,
    pub spec: StrategySpec,
    pub engine: EngineConfig,
    pub statistics: StatisticsConfig,
}

/// Run one job against a dataset and calendar.
pub fn run_single(
    dataset: &PriceDataset,
    calendar: &TradingCalendar,
    job: &RunJob,
) -> Result<BacktestResult, RunError> {
    let fingerprint = dataset_fingerprint(dataset);
    run_with_fingerprint(dataset, calendar, job, &fingerprint)
}

/// Run one job when the dataset fingerprint is already known.
pub(crate) fn run_with_fingerprint(
    dataset: &PriceDataset,
    calendar: &TradingCalendar,
    job: &RunJob,
    fingerprint: &str,
) -> Result<BacktestResult, RunError> {
    let strategy = job.spec.build().map_err(|source| RunError::Strategy {
        label: job.label.clone(),
        source,
    })?;

    let run = run_backtest(dataset, calendar, strategy, job.engine.clone()).map_err(|failure| {
        RunError::Failed {
            label: job.label.clone(),
            failure,
        }
    })?;

    let result = BacktestResult::from_run(
        job.label.clone(),
        job.spec.clone(),
        job.engine.clone(),
        job.statistics,
        fingerprint,
        run,
    );
    info!(
        label = %result.label,
        run_id = %&result.run_id[..12],
        sessions = result.records().len(),
        final_equity = result.final_equity(),
        "run finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn dataset() -> PriceDataset {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..30).map(|i| base + chrono::Duration::days(i)).collect();
        let mut closes = BTreeMap::new();
        closes.insert(
            "A".to_string(),
            (0..30).map(|i| 100.0 + i as f64).collect(),
        );
        closes.insert(
            "B".to_string(),
            (0..30).map(|i| 50.0 + (i % 5) as f64).collect(),
        );
        PriceDataset::from_closes(dates, closes).unwrap()
    }

    fn job(spec: StrategySpec) -> RunJob {
        RunJob {
            label: "job".into(),
            spec,
            engine: EngineConfig::default(),
            statistics: StatisticsConfig::default(),
        }
    }

    #[test]
    fn completed_run_carries_provenance() {
        let ds = dataset();
        let cal = TradingCalendar::from_dataset(&ds);
        let result = run_single(&ds, &cal, &job(StrategySpec::default())).unwrap();
        assert_eq!(result.label, "job");
        assert_eq!(result.strategy, "equal_weight");
        assert_eq!(result.records().len(), 30);
        assert_eq!(result.dataset_hash, dataset_fingerprint(&ds));
    }

    #[test]
    fn invalid_spec_is_a_strategy_error() {
        let ds = dataset();
        let cal = TradingCalendar::from_dataset(&ds);
        let spec = StrategySpec::RiskParity {
            lookback: 1,
            assets: None,
        };
        let err = run_single(&ds, &cal, &job(spec)).unwrap_err();
        assert!(matches!(err, RunError::Strategy { .. }));
        assert!(err.partial_records().is_empty());
    }

    #[test]
    fn engine_failure_keeps_label() {
        let ds = dataset();
        let cal = TradingCalendar::from_dataset(&ds);
        let spec = StrategySpec::EqualWeight {
            assets: Some(vec!["A".into(), "MISSING".into()]),
        };
        let err = run_single(&ds, &cal, &job(spec)).unwrap_err();
        match err {
            RunError::Failed { label, .. } => assert_eq!(label, "job"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
