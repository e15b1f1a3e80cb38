//! Moving average crossover, applied asset by asset.
//!
//! Each asset is long while its fast SMA is above its slow SMA, and short (or
//! flat, when shorting is disabled) while it is below. Active positions share
//! the book equally, so gross exposure is 1.0, or 0.0 when every asset is flat.

use crate::data::PriceWindow;
use crate::error::{ConfigError, StrategyError};
use crate::numeric::mean;
use crate::weights::{ExposureContract, GrossExposure, WeightVector};

use super::{resolve_universe, Strategy};

#[derive(Debug, Clone)]
pub struct MaCrossover {
    pub fast_period: usize,
    pub slow_period: usize,
    pub allow_short: bool,
    assets: Option<Vec<String>>,
}

impl MaCrossover {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        allow_short: bool,
        assets: Option<Vec<String>>,
    ) -> Result<Self, ConfigError> {
        if fast_period == 0 {
            return Err(ConfigError::InvalidStrategyParameter(
                "ma_crossover fast_period must be >= 1".into(),
            ));
        }
        if slow_period <= fast_period {
            return Err(ConfigError::InvalidStrategyParameter(format!(
                "ma_crossover slow_period ({slow_period}) must be > fast_period ({fast_period})"
            )));
        }
        Ok(Self {
            fast_period,
            slow_period,
            allow_short,
            assets,
        })
    }

    /// +1 long, -1 short, 0 flat.
    fn signal(&self, window: &PriceWindow<'_>, asset: &str) -> Result<f64, StrategyError> {
        let slow = window.trailing_closes(asset, self.slow_period)?;
        let fast = &slow[slow.len() - self.fast_period..];
        let (fast_ma, slow_ma) = (mean(fast), mean(slow));

        Ok(if fast_ma > slow_ma {
            1.0
        } else if fast_ma < slow_ma && self.allow_short {
            -1.0
        } else {
            0.0
        })
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn min_history(&self) -> usize {
        self.slow_period
    }

    fn exposure(&self) -> ExposureContract {
        ExposureContract {
            gross: GrossExposure::AtMost(1.0),
            allow_short: self.allow_short,
        }
    }

    fn compute_weights(
        &mut self,
        window: &PriceWindow<'_>,
        _prior: Option<&WeightVector>,
    ) -> Result<WeightVector, StrategyError> {
        window.require_history(self.slow_period)?;
        let universe = resolve_universe(window, &self.assets)?;

        let mut signals = Vec::with_capacity(universe.len());
        for asset in &universe {
            signals.push(self.signal(window, asset)?);
        }

        let active = signals.iter().filter(|s| **s != 0.0).count();
        if active == 0 {
            return Ok(WeightVector::new());
        }
        let size = 1.0 / active as f64;
        Ok(universe
            .into_iter()
            .zip(signals)
            .filter(|(_, s)| *s != 0.0)
            .map(|(asset, s)| (asset, s * size))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{dataset, path};

    #[test]
    fn rejects_inverted_periods() {
        assert!(MaCrossover::new(50, 10, false, None).is_err());
        assert!(MaCrossover::new(0, 10, false, None).is_err());
    }

    #[test]
    fn uptrend_is_long() {
        let ds = dataset(&[("A", path(60, 0.01, 0.0))]);
        let mut s = MaCrossover::new(5, 20, false, None).unwrap();
        let w = s.compute_weights(&ds.window(59), None).unwrap();
        assert_eq!(w.get("A"), 1.0);
    }

    #[test]
    fn downtrend_is_flat_when_long_only() {
        let ds = dataset(&[("A", path(60, -0.01, 0.0)), ("B", path(60, 0.01, 0.0))]);
        let mut s = MaCrossover::new(5, 20, false, None).unwrap();
        let w = s.compute_weights(&ds.window(59), None).unwrap();
        assert_eq!(w.get("A"), 0.0);
        assert_eq!(w.get("B"), 1.0);
    }

    #[test]
    fn downtrend_is_short_when_allowed() {
        let ds = dataset(&[("A", path(60, -0.01, 0.0)), ("B", path(60, 0.01, 0.0))]);
        let mut s = MaCrossover::new(5, 20, true, None).unwrap();
        let w = s.compute_weights(&ds.window(59), None).unwrap();
        assert_eq!(w.get("A"), -0.5);
        assert_eq!(w.get("B"), 0.5);
        assert!(s.exposure().check(&w).is_ok());
    }

    #[test]
    fn short_window_is_insufficient_history() {
        let ds = dataset(&[("A", path(10, 0.01, 0.0))]);
        let mut s = MaCrossover::new(5, 20, false, None).unwrap();
        let err = s.compute_weights(&ds.window(9), None).unwrap_err();
        assert!(err.is_insufficient_history());
    }

    #[test]
    fn all_flat_is_cash() {
        let ds = dataset(&[("A", vec![100.0; 30])]);
        let mut s = MaCrossover::new(5, 20, true, None).unwrap();
        let w = s.compute_weights(&ds.window(29), None).unwrap();
        assert!(w.is_cash());
        assert!(s.exposure().check(&w).is_ok());
    }
}
