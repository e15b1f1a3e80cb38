//! Multi-run comparison on a common date index.
//!
//! Results are inner-joined on their record dates: a date missing from any
//! run is dropped from all of them, never interpolated. Each entry reports
//! how many of its own dates were dropped. Relative figures use the first
//! result as the benchmark.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::metrics;
use crate::result::{BacktestResult, Statistics};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompareError {
    #[error("comparison needs at least two results, got {0}")]
    TooFewResults(usize),

    #[error("results share no dates")]
    EmptyIntersection,

    #[error("'{label}' is annualized over {found} periods per year, benchmark over {expected}")]
    PeriodsPerYearMismatch {
        label: String,
        expected: f64,
        found: f64,
    },
}

/// One run's view of the aligned comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub label: String,
    pub run_id: String,
    pub strategy: String,
    /// Dates of this run dropped by the inner join.
    pub excluded_dates: usize,
    /// Statistics over the aligned dates only.
    pub statistics: Statistics,
    /// Annualized return minus the benchmark's.
    pub excess_return: f64,
    pub tracking_error: f64,
    pub information_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub dates: Vec<NaiveDate>,
    /// Same order as the input; the first entry is the benchmark.
    pub entries: Vec<ComparisonEntry>,
    /// Pairwise correlation of aligned returns, indexed like `entries`.
    pub correlation: Vec<Vec<f64>>,
}

impl Comparison {
    pub fn benchmark(&self) -> &ComparisonEntry {
        &self.entries[0]
    }

    pub fn entry(&self, label: &str) -> Option<&ComparisonEntry> {
        self.entries.iter().find(|e| e.label == label)
    }
}

/// Align `results` on their common dates and compute relative statistics.
pub fn compare(results: &[&BacktestResult]) -> Result<Comparison, CompareError> {
    if results.len() < 2 {
        return Err(CompareError::TooFewResults(results.len()));
    }

    let ppy = results[0].engine.periods_per_year;
    if let Some(other) = results[1..]
        .iter()
        .find(|r| r.engine.periods_per_year != ppy)
    {
        return Err(CompareError::PeriodsPerYearMismatch {
            label: other.label.clone(),
            expected: ppy,
            found: other.engine.periods_per_year,
        });
    }

    let mut common: BTreeSet<NaiveDate> = results[0].dates().into_iter().collect();
    for result in &results[1..] {
        let dates: BTreeSet<NaiveDate> = result.dates().into_iter().collect();
        common = common.intersection(&dates).copied().collect();
    }
    if common.is_empty() {
        return Err(CompareError::EmptyIntersection);
    }

    let aligned: Vec<BacktestResult> = results
        .iter()
        .map(|result| {
            let records = result
                .records()
                .iter()
                .filter(|r| common.contains(&r.date))
                .cloned()
                .collect();
            result.with_records(records)
        })
        .collect();
    let returns: Vec<Vec<f64>> = aligned.iter().map(BacktestResult::returns).collect();

    let bench_returns = &returns[0];
    let bench_annual = aligned[0].statistics().annualized_return;

    let entries = results
        .iter()
        .zip(&aligned)
        .zip(&returns)
        .map(|((original, view), rets)| {
            let excluded = original.records().len() - view.records().len();
            if excluded > 0 {
                debug!(label = %original.label, excluded, "dates dropped by alignment");
            }
            let statistics = view.statistics().clone();
            ComparisonEntry {
                label: original.label.clone(),
                run_id: original.run_id.clone(),
                strategy: original.strategy.clone(),
                excluded_dates: excluded,
                excess_return: statistics.annualized_return - bench_annual,
                tracking_error: metrics::tracking_error(rets, bench_returns, ppy),
                information_ratio: metrics::information_ratio(rets, bench_returns, ppy),
                statistics,
            }
        })
        .collect();

    let n = returns.len();
    let mut correlation = vec![vec![1.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let c = metrics::correlation(&returns[i], &returns[j]);
            correlation[i][j] = c;
            correlation[j][i] = c;
        }
    }

    Ok(Comparison {
        dates: common.into_iter().collect(),
        entries,
        correlation,
    })
}
