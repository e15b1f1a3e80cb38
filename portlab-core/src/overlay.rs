//! Volatility-targeting overlay.
//!
//! Rescales a target weight vector so the trailing realized volatility of the
//! portfolio it describes matches an annualized target. The scale factor is
//! clamped to `max_leverage`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::PriceWindow;
use crate::error::{ConfigError, WindowError};
use crate::numeric::sample_std;
use crate::weights::WeightVector;

/// Realized volatility below this is treated as zero.
const MIN_REALIZED_VOL: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityTarget {
    /// Annualized target volatility (e.g. 0.10 for 10%).
    pub target_vol: f64,
    /// Number of trailing returns used to estimate realized volatility.
    pub lookback: usize,
    pub max_leverage: f64,
    pub periods_per_year: f64,
}

/// Output of a successful overlay application.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledWeights {
    pub weights: WeightVector,
    pub leverage: f64,
    /// Annualized realized volatility of the unscaled weights.
    pub realized_vol: f64,
}

impl VolatilityTarget {
    pub fn new(
        target_vol: f64,
        lookback: usize,
        max_leverage: f64,
        periods_per_year: f64,
    ) -> Result<Self, ConfigError> {
        if !(target_vol.is_finite() && target_vol > 0.0) {
            return Err(ConfigError::InvalidVolTarget(target_vol));
        }
        if lookback < 2 {
            return Err(ConfigError::InvalidVolLookback(lookback));
        }
        if !(max_leverage.is_finite() && max_leverage > 0.0) {
            return Err(ConfigError::InvalidMaxLeverage(max_leverage));
        }
        if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
            return Err(ConfigError::InvalidPeriodsPerYear(periods_per_year));
        }
        Ok(Self {
            target_vol,
            lookback,
            max_leverage,
            periods_per_year,
        })
    }

    /// Scale `weights` using trailing returns from `window`.
    ///
    /// Fails with `InsufficientHistory` when fewer than `lookback` trailing
    /// returns are visible; the engine treats that as a recoverable fallback.
    pub fn scale(
        &self,
        weights: &WeightVector,
        window: &PriceWindow<'_>,
    ) -> Result<ScaledWeights, WindowError> {
        window.require_history(self.lookback + 1)?;

        let mut asset_returns: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for (asset, w) in weights.iter() {
            if w != 0.0 {
                asset_returns.insert(asset, window.trailing_returns(asset, self.lookback)?);
            }
        }

        let portfolio: Vec<f64> = (0..self.lookback)
            .map(|t| {
                asset_returns
                    .iter()
                    .map(|(asset, r)| weights.get(asset) * r[t])
                    .sum()
            })
            .collect();

        let realized_vol = sample_std(&portfolio) * self.periods_per_year.sqrt();
        let leverage = self.leverage_for(realized_vol);

        Ok(ScaledWeights {
            weights: weights.scaled(leverage),
            leverage,
            realized_vol,
        })
    }

    /// `target / realized`, clamped to `max_leverage`.
    pub fn leverage_for(&self, realized_vol: f64) -> f64 {
        if realized_vol < MIN_REALIZED_VOL {
            return self.max_leverage;
        }
        (self.target_vol / realized_vol).min(self.max_leverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceDataset;
    use chrono::NaiveDate;

    fn dataset(closes_a: Vec<f64>) -> PriceDataset {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..closes_a.len())
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let mut closes = BTreeMap::new();
        closes.insert("A".to_string(), closes_a);
        PriceDataset::from_closes(dates, closes).unwrap()
    }

    fn alternating(n: usize, amplitude: f64) -> Vec<f64> {
        let mut p = 100.0;
        let mut out = vec![p];
        for i in 0..n {
            p *= if i % 2 == 0 { 1.0 + amplitude } else { 1.0 - amplitude };
            out.push(p);
        }
        out
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(VolatilityTarget::new(0.0, 20, 2.0, 252.0).is_err());
        assert!(VolatilityTarget::new(0.1, 1, 2.0, 252.0).is_err());
        assert!(VolatilityTarget::new(0.1, 20, 0.0, 252.0).is_err());
        assert!(VolatilityTarget::new(0.1, 20, 2.0, 0.0).is_err());
    }

    #[test]
    fn insufficient_history_is_reported() {
        let ds = dataset(alternating(5, 0.01));
        let vt = VolatilityTarget::new(0.1, 10, 2.0, 252.0).unwrap();
        let weights: WeightVector = [("A", 1.0)].into_iter().collect();
        let err = vt.scale(&weights, &ds.window(5)).unwrap_err();
        assert!(matches!(err, WindowError::InsufficientHistory { .. }));
    }

    #[test]
    fn scales_toward_target() {
        let ds = dataset(alternating(40, 0.02));
        let vt = VolatilityTarget::new(0.10, 20, 10.0, 252.0).unwrap();
        let weights: WeightVector = [("A", 1.0)].into_iter().collect();
        let out = vt.scale(&weights, &ds.window(40)).unwrap();
        assert!(out.realized_vol > 0.0);
        assert!((out.leverage - 0.10 / out.realized_vol).abs() < 1e-12);
        assert!((out.weights.get("A") - out.leverage).abs() < 1e-12);
    }

    #[test]
    fn flat_prices_clamp_to_max_leverage() {
        let ds = dataset(vec![100.0; 30]);
        let vt = VolatilityTarget::new(0.10, 20, 1.5, 252.0).unwrap();
        let weights: WeightVector = [("A", 1.0)].into_iter().collect();
        let out = vt.scale(&weights, &ds.window(29)).unwrap();
        assert_eq!(out.leverage, 1.5);
    }

    #[test]
    fn high_volatility_deleverages() {
        let ds = dataset(alternating(40, 0.05));
        let vt = VolatilityTarget::new(0.05, 20, 3.0, 252.0).unwrap();
        let weights: WeightVector = [("A", 1.0)].into_iter().collect();
        let out = vt.scale(&weights, &ds.window(40)).unwrap();
        assert!(out.leverage < 1.0);
    }
}
