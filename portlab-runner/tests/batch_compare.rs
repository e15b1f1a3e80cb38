//! Integration tests for batch execution and multi-run comparison on
//! synthetic data.

use chrono::NaiveDate;
use std::sync::atomic::AtomicBool;

use portlab_core::calendar::{RebalanceFrequency, TradingCalendar};
use portlab_core::data::PriceDataset;
use portlab_core::engine::EngineConfig;
use portlab_core::strategies::StrategySpec;
use portlab_runner::batch::{run_batch, BatchOptions, BatchOutcome};
use portlab_runner::compare::{compare, CompareError};
use portlab_runner::config::StatisticsConfig;
use portlab_runner::data_loader::synthetic_dataset;
use portlab_runner::runner::{run_single, RunError, RunJob};

fn assets() -> Vec<String> {
    ["AAA", "BBB", "CCC", "DDD", "EEE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn dataset() -> PriceDataset {
    synthetic_dataset(&assets(), d(2022, 1, 3), d(2023, 6, 30)).unwrap()
}

fn engine() -> EngineConfig {
    EngineConfig {
        rebalancing_frequency: RebalanceFrequency::Weekly,
        transaction_cost_rate: 0.001,
        ..EngineConfig::default()
    }
}

fn job(label: &str, spec: StrategySpec) -> RunJob {
    RunJob {
        label: label.into(),
        spec,
        engine: engine(),
        statistics: StatisticsConfig::default(),
    }
}

fn jobs() -> Vec<RunJob> {
    vec![
        job("ew", StrategySpec::default()),
        job(
            "trend",
            StrategySpec::MaCrossover {
                fast_period: 10,
                slow_period: 40,
                allow_short: false,
                assets: None,
            },
        ),
        job(
            "broken",
            StrategySpec::PairsTrading {
                asset_a: "AAA".into(),
                asset_b: "NOPE".into(),
                lookback: 30,
                entry_z: 2.0,
                exit_z: 0.5,
            },
        ),
        job(
            "rp",
            StrategySpec::RiskParity {
                lookback: 30,
                assets: None,
            },
        ),
        job("cap", StrategySpec::MarketCap { assets: None }),
    ]
}

// ── Batch ────────────────────────────────────────────────────────────

#[test]
fn batch_preserves_submission_order() {
    let ds = dataset();
    let cal = TradingCalendar::from_dataset(&ds);
    let jobs = jobs();
    let outcomes = run_batch(
        &ds,
        &cal,
        &jobs,
        &BatchOptions {
            threads: 3,
            cancel: None,
        },
    )
    .unwrap();

    assert_eq!(outcomes.len(), jobs.len());
    for (job, outcome) in jobs.iter().zip(&outcomes) {
        match outcome {
            BatchOutcome::Completed(result) => assert_eq!(result.label, job.label),
            BatchOutcome::Failed(RunError::Failed { label, failure }) => {
                assert_eq!(label, "broken");
                assert!(failure.records.is_empty());
            }
            other => panic!("unexpected outcome for {}: {other:?}", job.label),
        }
    }
    assert!(outcomes[2].result().is_none());
    assert_eq!(outcomes.iter().filter(|o| o.result().is_some()).count(), 4);
}

#[test]
fn batch_results_match_single_runs() {
    let ds = dataset();
    let cal = TradingCalendar::from_dataset(&ds);
    let jobs = jobs();
    let outcomes = run_batch(&ds, &cal, &jobs, &BatchOptions::default()).unwrap();

    for (job, outcome) in jobs.iter().zip(&outcomes) {
        if let Some(batched) = outcome.result() {
            let single = run_single(&ds, &cal, job).unwrap();
            assert_eq!(batched.records(), single.records(), "{}", job.label);
            assert_eq!(batched.run_id, single.run_id);
        }
    }
}

#[test]
fn thread_count_does_not_change_results() {
    let ds = dataset();
    let cal = TradingCalendar::from_dataset(&ds);
    let jobs = jobs();
    let one = run_batch(&ds, &cal, &jobs, &BatchOptions { threads: 1, cancel: None }).unwrap();
    let four = run_batch(&ds, &cal, &jobs, &BatchOptions { threads: 4, cancel: None }).unwrap();
    for (a, b) in one.iter().zip(&four) {
        assert_eq!(a.result().map(|r| r.records()), b.result().map(|r| r.records()));
    }
}

#[test]
fn cancelled_batch_starts_nothing() {
    let ds = dataset();
    let cal = TradingCalendar::from_dataset(&ds);
    let cancel = AtomicBool::new(true);
    let outcomes = run_batch(
        &ds,
        &cal,
        &jobs(),
        &BatchOptions {
            threads: 2,
            cancel: Some(&cancel),
        },
    )
    .unwrap();
    assert!(outcomes.iter().all(BatchOutcome::is_cancelled));
}

// ── Comparison ───────────────────────────────────────────────────────

#[test]
fn comparison_inner_joins_dates() {
    let ds = dataset();
    let cal = TradingCalendar::from_dataset(&ds);
    let full = run_single(&ds, &cal, &job("full", StrategySpec::default())).unwrap();
    let mut late_job = job("late", StrategySpec::default());
    late_job.engine.special_start_offset = 50;
    let late = run_single(&ds, &cal, &late_job).unwrap();

    let comparison = compare(&[&full, &late]).unwrap();
    assert_eq!(comparison.dates.len(), late.records().len());
    assert_eq!(comparison.dates.first(), late.dates().first());
    assert_eq!(comparison.entries[0].excluded_dates, 50);
    assert_eq!(comparison.entries[1].excluded_dates, 0);
    assert_eq!(comparison.benchmark().label, "full");
    assert_eq!(
        comparison.entries[1].statistics.sessions,
        comparison.dates.len()
    );
    // the unaligned result is untouched
    assert_eq!(full.statistics().sessions, full.records().len());
}

#[test]
fn benchmark_relative_figures() {
    let ds = dataset();
    let cal = TradingCalendar::from_dataset(&ds);
    let ew = run_single(&ds, &cal, &job("ew", StrategySpec::default())).unwrap();
    let rp = run_single(
        &ds,
        &cal,
        &job(
            "rp",
            StrategySpec::RiskParity {
                lookback: 30,
                assets: None,
            },
        ),
    )
    .unwrap();

    let comparison = compare(&[&ew, &ew, &rp]).unwrap();
    let bench = comparison.benchmark();
    assert_eq!(bench.excess_return, 0.0);
    assert_eq!(bench.tracking_error, 0.0);
    assert_eq!(bench.information_ratio, None);

    assert!((comparison.correlation[0][1] - 1.0).abs() < 1e-12);
    assert_eq!(comparison.correlation[1][2], comparison.correlation[2][1]);
    assert!(comparison.correlation[0][2] < 1.0);
    assert!(comparison.entries[2].tracking_error > 0.0);
    assert!(comparison.entry("rp").unwrap().information_ratio.is_some());
}

#[test]
fn comparison_errors() {
    let early = synthetic_dataset(&assets(), d(2022, 1, 3), d(2022, 6, 30)).unwrap();
    let late = synthetic_dataset(&assets(), d(2023, 1, 2), d(2023, 6, 30)).unwrap();
    let a = run_single(
        &early,
        &TradingCalendar::from_dataset(&early),
        &job("a", StrategySpec::default()),
    )
    .unwrap();
    let b = run_single(
        &late,
        &TradingCalendar::from_dataset(&late),
        &job("b", StrategySpec::default()),
    )
    .unwrap();

    assert_eq!(compare(&[&a]).unwrap_err(), CompareError::TooFewResults(1));
    assert_eq!(compare(&[&a, &b]).unwrap_err(), CompareError::EmptyIntersection);
}

#[test]
fn comparison_rejects_mixed_annualization() {
    let ds = dataset();
    let cal = TradingCalendar::from_dataset(&ds);
    let daily = run_single(&ds, &cal, &job("daily", StrategySpec::default())).unwrap();
    let mut weekly_job = job("weekly", StrategySpec::default());
    weekly_job.engine.periods_per_year = 52.0;
    let weekly = run_single(&ds, &cal, &weekly_job).unwrap();

    assert_eq!(
        compare(&[&daily, &weekly]).unwrap_err(),
        CompareError::PeriodsPerYearMismatch {
            label: "weekly".into(),
            expected: 252.0,
            found: 52.0,
        }
    );
}
