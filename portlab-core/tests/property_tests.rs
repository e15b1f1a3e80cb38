//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Gross exposure: long-only fully invested runs keep sum |w| = 1 every session
//! 2. Cost model: drag = turnover * rate, entry turnover = gross, no trade no cost
//! 3. Drift: buy-and-hold drift keeps a fully invested long book fully invested
//! 4. Determinism: the same run twice gives identical records

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::BTreeMap;

use portlab_core::calendar::{RebalanceFrequency, TradingCalendar};
use portlab_core::cost::CostModel;
use portlab_core::data::PriceDataset;
use portlab_core::engine::{run_backtest, EngineConfig, HoldingPolicy};
use portlab_core::strategies::{EqualWeight, RiskParity};
use portlab_core::weights::WeightVector;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Per-session returns for `assets` assets over `n` sessions.
fn arb_returns(assets: usize, n: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-0.08..0.08_f64, n), assets)
}

fn arb_weights() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop::collection::btree_map("[A-F]", -2.0..2.0_f64, 0..6)
        .prop_map(|m| m.into_iter().collect())
}

fn arb_long_book() -> impl Strategy<Value = WeightVector> {
    prop::collection::vec(0.01..1.0_f64, 2..6).prop_map(|raw| {
        let total: f64 = raw.iter().sum();
        raw.iter()
            .enumerate()
            .map(|(i, w)| (format!("X{i}"), w / total))
            .collect()
    })
}

fn build_dataset(returns: &[Vec<f64>]) -> PriceDataset {
    let n = returns[0].len() + 1;
    let base = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    let dates = (0..n)
        .map(|i| base + chrono::Duration::days(i as i64))
        .collect();
    let closes: BTreeMap<String, Vec<f64>> = returns
        .iter()
        .enumerate()
        .map(|(k, rs)| {
            let mut p = 100.0;
            let mut col = vec![p];
            for r in rs {
                p *= 1.0 + r;
                col.push(p);
            }
            (format!("A{k}"), col)
        })
        .collect();
    PriceDataset::from_closes(dates, closes).unwrap()
}

// ── 1. Gross exposure ────────────────────────────────────────────────

proptest! {
    #[test]
    fn long_only_gross_exposure_holds_every_session(
        returns in arb_returns(3, 60),
        weekly in any::<bool>(),
        fixed in any::<bool>(),
    ) {
        let ds = build_dataset(&returns);
        let cal = TradingCalendar::from_dataset(&ds);
        let config = EngineConfig {
            rebalancing_frequency: if weekly {
                RebalanceFrequency::Weekly
            } else {
                RebalanceFrequency::EveryNSessions { n: 7 }
            },
            holding: if fixed { HoldingPolicy::Fixed } else { HoldingPolicy::Drift },
            transaction_cost_rate: 0.001,
            ..EngineConfig::default()
        };
        let result = run_backtest(&ds, &cal, Box::new(EqualWeight::default()), config).unwrap();
        prop_assert_eq!(result.records.len(), 61);
        for record in &result.records {
            prop_assert!((record.weights.gross_exposure() - 1.0).abs() < 1e-9);
            prop_assert!(record.weights.iter().all(|(_, w)| w >= 0.0));
        }
    }

    #[test]
    fn risk_parity_runs_stay_fully_invested(returns in arb_returns(4, 80)) {
        let ds = build_dataset(&returns);
        let cal = TradingCalendar::from_dataset(&ds);
        let strategy = RiskParity::new(20, None).unwrap();
        let result = run_backtest(&ds, &cal, Box::new(strategy), EngineConfig::default()).unwrap();
        for record in &result.records {
            prop_assert!((record.weights.gross_exposure() - 1.0).abs() < 1e-9);
        }
    }
}

// ── 2. Cost model ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn drag_is_turnover_times_rate(
        prior in arb_weights(),
        new in arb_weights(),
        tc in 0.0..0.01_f64,
        slip in 0.0..0.01_f64,
    ) {
        let prior: WeightVector = prior.into_iter().collect();
        let new: WeightVector = new.into_iter().collect();
        let model = CostModel::new(tc, slip).unwrap();
        let charge = model.apply(&prior, &new);
        prop_assert!((charge.drag - charge.turnover * (tc + slip)).abs() < 1e-15);
        prop_assert!((charge.turnover - model.apply(&new, &prior).turnover).abs() < 1e-12);
        prop_assert!(charge.turnover >= 0.0);
    }

    #[test]
    fn entering_from_cash_turns_over_gross(new in arb_weights(), tc in 0.0..0.01_f64) {
        let new: WeightVector = new.into_iter().collect();
        let charge = CostModel::new(tc, 0.0).unwrap().apply(&WeightVector::new(), &new);
        prop_assert!((charge.turnover - new.gross_exposure()).abs() < 1e-12);
    }

    #[test]
    fn holding_still_costs_nothing(w in arb_weights(), tc in 0.0..0.01_f64) {
        let w: WeightVector = w.into_iter().collect();
        let charge = CostModel::new(tc, tc).unwrap().apply(&w, &w);
        prop_assert_eq!(charge.turnover, 0.0);
        prop_assert_eq!(charge.drag, 0.0);
    }
}

// ── 3. Drift ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn drift_keeps_full_investment(
        book in arb_long_book(),
        rets in prop::collection::vec(-0.5..0.5_f64, 6),
    ) {
        let returns: BTreeMap<String, f64> = book
            .assets()
            .zip(&rets)
            .map(|(a, r)| (a.to_string(), *r))
            .collect();
        let drifted = book.drifted(&returns);
        prop_assert!((drifted.net_exposure() - 1.0).abs() < 1e-12);
        prop_assert!(drifted.iter().all(|(_, w)| w >= 0.0));
    }
}

// ── 4. Determinism ───────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn runs_are_reproducible(returns in arb_returns(3, 50)) {
        let ds = build_dataset(&returns);
        let cal = TradingCalendar::from_dataset(&ds);
        let config = EngineConfig {
            rebalancing_frequency: RebalanceFrequency::Daily,
            transaction_cost_rate: 0.002,
            vol_target: Some(0.1),
            vol_lookback: 10,
            max_leverage: 3.0,
            ..EngineConfig::default()
        };
        let a = run_backtest(&ds, &cal, Box::new(EqualWeight::default()), config.clone()).unwrap();
        let b = run_backtest(&ds, &cal, Box::new(EqualWeight::default()), config).unwrap();
        prop_assert_eq!(a.records, b.records);
    }
}
