//! Naive risk parity: weights proportional to inverse trailing volatility.

use crate::data::PriceWindow;
use crate::error::{ConfigError, StrategyError};
use crate::numeric::sample_std;
use crate::weights::{ExposureContract, WeightVector};

use super::{resolve_universe, return_columns, Strategy};

#[derive(Debug, Clone)]
pub struct RiskParity {
    pub lookback: usize,
    assets: Option<Vec<String>>,
}

impl RiskParity {
    pub fn new(lookback: usize, assets: Option<Vec<String>>) -> Result<Self, ConfigError> {
        if lookback < 2 {
            return Err(ConfigError::InvalidStrategyParameter(format!(
                "risk_parity lookback must be >= 2, got {lookback}"
            )));
        }
        Ok(Self { lookback, assets })
    }
}

impl Strategy for RiskParity {
    fn name(&self) -> &str {
        "risk_parity"
    }

    fn min_history(&self) -> usize {
        self.lookback + 1
    }

    fn exposure(&self) -> ExposureContract {
        ExposureContract::long_only()
    }

    fn compute_weights(
        &mut self,
        window: &PriceWindow<'_>,
        _prior: Option<&WeightVector>,
    ) -> Result<WeightVector, StrategyError> {
        window.require_history(self.min_history())?;
        let universe = resolve_universe(window, &self.assets)?;
        let columns = return_columns(window, &universe, self.lookback)?;

        let mut inverse = Vec::with_capacity(universe.len());
        for (asset, returns) in universe.iter().zip(&columns) {
            let vol = sample_std(returns);
            if vol <= 0.0 || !vol.is_finite() {
                return Err(StrategyError::Degenerate(format!(
                    "zero trailing volatility for '{asset}'"
                )));
            }
            inverse.push(1.0 / vol);
        }

        let total: f64 = inverse.iter().sum();
        Ok(universe
            .into_iter()
            .zip(inverse)
            .map(|(asset, iv)| (asset, iv / total))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{dataset, path};

    #[test]
    fn twice_the_vol_gets_half_the_weight() {
        let ds = dataset(&[("A", path(40, 0.0, 0.01)), ("B", path(40, 0.0, 0.02))]);
        let mut s = RiskParity::new(20, None).unwrap();
        let w = s.compute_weights(&ds.window(39), None).unwrap();
        let ratio = w.get("A") / w.get("B");
        assert!((ratio - 2.0).abs() < 0.05, "ratio {ratio}");
        assert!(s.exposure().check(&w).is_ok());
    }

    #[test]
    fn flat_series_is_degenerate() {
        let ds = dataset(&[("A", vec![100.0; 30]), ("B", path(30, 0.0, 0.01))]);
        let mut s = RiskParity::new(10, None).unwrap();
        let err = s.compute_weights(&ds.window(29), None).unwrap_err();
        assert!(matches!(err, StrategyError::Degenerate(_)));
    }

    #[test]
    fn rejects_short_lookback() {
        assert!(RiskParity::new(1, None).is_err());
    }
}
