//! Global minimum-variance portfolio.
//!
//! Weights solve `min w'Σw` subject to `sum(w) = 1`, i.e. `w ∝ Σ⁻¹1`, with Σ
//! the sample covariance of trailing returns plus a small ridge. Long-only
//! mode repeatedly drops the most negative asset and re-solves on the rest.

use crate::data::PriceWindow;
use crate::error::{ConfigError, StrategyError};
use crate::numeric::{covariance_matrix, solve_linear};
use crate::weights::{ExposureContract, GrossExposure, WeightVector};

use super::{resolve_universe, return_columns, Strategy};

/// Ridge added to the diagonal, relative to the mean variance.
const RIDGE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct MinimumVariance {
    pub lookback: usize,
    pub long_only: bool,
    assets: Option<Vec<String>>,
}

impl MinimumVariance {
    pub fn new(
        lookback: usize,
        long_only: bool,
        assets: Option<Vec<String>>,
    ) -> Result<Self, ConfigError> {
        if lookback < 2 {
            return Err(ConfigError::InvalidStrategyParameter(format!(
                "min_variance lookback must be >= 2, got {lookback}"
            )));
        }
        Ok(Self {
            lookback,
            long_only,
            assets,
        })
    }
}

/// Unconstrained minimum-variance weights for a covariance matrix.
fn solve_min_variance(cov: &[Vec<f64>]) -> Result<Vec<f64>, StrategyError> {
    let k = cov.len();
    let mean_var = (0..k).map(|i| cov[i][i]).sum::<f64>() / k as f64;
    let ridge = RIDGE * mean_var.max(f64::MIN_POSITIVE);

    let mut a = cov.to_vec();
    for (i, row) in a.iter_mut().enumerate() {
        row[i] += ridge;
    }
    let x = solve_linear(a, vec![1.0; k])
        .ok_or_else(|| StrategyError::Degenerate("covariance matrix is singular".into()))?;

    let total: f64 = x.iter().sum();
    if !total.is_finite() || total.abs() < 1e-300 {
        return Err(StrategyError::Degenerate(
            "minimum-variance weights do not normalize".into(),
        ));
    }
    Ok(x.into_iter().map(|v| v / total).collect())
}

impl Strategy for MinimumVariance {
    fn name(&self) -> &str {
        "min_variance"
    }

    fn min_history(&self) -> usize {
        self.lookback + 1
    }

    fn exposure(&self) -> ExposureContract {
        if self.long_only {
            ExposureContract::long_only()
        } else {
            ExposureContract {
                gross: GrossExposure::Unconstrained,
                allow_short: true,
            }
        }
    }

    fn compute_weights(
        &mut self,
        window: &PriceWindow<'_>,
        _prior: Option<&WeightVector>,
    ) -> Result<WeightVector, StrategyError> {
        window.require_history(self.min_history())?;
        let universe = resolve_universe(window, &self.assets)?;
        let columns = return_columns(window, &universe, self.lookback)?;
        let cov = covariance_matrix(&columns);

        let mut active: Vec<usize> = (0..universe.len()).collect();
        loop {
            let sub: Vec<Vec<f64>> = active
                .iter()
                .map(|&i| active.iter().map(|&j| cov[i][j]).collect())
                .collect();
            let weights = solve_min_variance(&sub)?;

            if self.long_only {
                let most_negative = weights
                    .iter()
                    .enumerate()
                    .filter(|(_, w)| **w < 0.0)
                    .min_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(pos, _)| pos);
                if let Some(pos) = most_negative {
                    active.remove(pos);
                    continue;
                }
            }

            return Ok(active
                .iter()
                .zip(weights)
                .map(|(&i, w)| (universe[i].clone(), w))
                .collect());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{cycle, dataset, path};

    #[test]
    fn low_volatility_asset_gets_more_weight() {
        let ds = dataset(&[
            ("CALM", cycle(80, 0.0005, 0.004, 1)),
            ("WILD", cycle(80, 0.0005, 0.03, 3)),
        ]);
        let mut s = MinimumVariance::new(60, true, None).unwrap();
        let w = s.compute_weights(&ds.window(79), None).unwrap();
        assert!(w.get("CALM") > w.get("WILD"));
        assert!((w.net_exposure() - 1.0).abs() < 1e-9);
        assert!(s.exposure().check(&w).is_ok());
    }

    #[test]
    fn long_only_never_shorts() {
        // Perfectly correlated, different scale: unconstrained solution shorts the wild one.
        let calm = path(80, 0.0, 0.01);
        let wild = path(80, 0.0, 0.02);
        let ds = dataset(&[("CALM", calm), ("WILD", wild)]);

        let mut s = MinimumVariance::new(40, true, None).unwrap();
        let w = s.compute_weights(&ds.window(79), None).unwrap();
        assert!(w.iter().all(|(_, x)| x >= 0.0));
        assert!((w.gross_exposure() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unconstrained_sums_to_one() {
        let ds = dataset(&[
            ("A", cycle(80, 0.001, 0.01, 1)),
            ("B", cycle(80, 0.0, 0.015, 2)),
            ("C", cycle(80, -0.001, 0.005, 5)),
        ]);
        let mut s = MinimumVariance::new(50, false, None).unwrap();
        let w = s.compute_weights(&ds.window(79), None).unwrap();
        assert!((w.net_exposure() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn needs_lookback_plus_one() {
        let ds = dataset(&[("A", path(20, 0.0, 0.01))]);
        let mut s = MinimumVariance::new(20, true, None).unwrap();
        assert_eq!(s.min_history(), 21);
        assert!(s
            .compute_weights(&ds.window(19), None)
            .unwrap_err()
            .is_insufficient_history());
    }
}
