//! Pairs trading on the z-score of a log-price spread.
//!
//! On every call the hedge ratio is refit by OLS of `ln(a)` on `ln(b)` over the
//! trailing `lookback` closes, so no fitted state outlives the window. The
//! current position (flat, long spread, short spread) is read from the sign of
//! `asset_a` in the prior weights.
//!
//! - flat: enter short spread when `z > entry_z`, long spread when `z < -entry_z`
//! - long spread: exit when `z >= -exit_z`
//! - short spread: exit when `z <= exit_z`
//!
//! A long spread holds `a` long and `beta` units of `b` short, normalized to
//! gross exposure 1.

use crate::data::PriceWindow;
use crate::error::{ConfigError, StrategyError};
use crate::numeric::{covariance, mean, sample_std};
use crate::weights::{ExposureContract, GrossExposure, WeightVector};

use super::Strategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpreadPosition {
    Flat,
    Long,
    Short,
}

/// Hedge ratio and spread z-score fitted from one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadFit {
    pub beta: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone)]
pub struct PairsTrading {
    pub asset_a: String,
    pub asset_b: String,
    pub lookback: usize,
    pub entry_z: f64,
    pub exit_z: f64,
}

impl PairsTrading {
    pub fn new(
        asset_a: impl Into<String>,
        asset_b: impl Into<String>,
        lookback: usize,
        entry_z: f64,
        exit_z: f64,
    ) -> Result<Self, ConfigError> {
        let (asset_a, asset_b) = (asset_a.into(), asset_b.into());
        if asset_a == asset_b {
            return Err(ConfigError::InvalidStrategyParameter(format!(
                "pairs_trading needs two distinct assets, got '{asset_a}' twice"
            )));
        }
        if lookback < 3 {
            return Err(ConfigError::InvalidStrategyParameter(format!(
                "pairs_trading lookback must be >= 3, got {lookback}"
            )));
        }
        if !(exit_z >= 0.0 && entry_z > exit_z && entry_z.is_finite()) {
            return Err(ConfigError::InvalidStrategyParameter(format!(
                "pairs_trading needs 0 <= exit_z < entry_z, got exit {exit_z}, entry {entry_z}"
            )));
        }
        Ok(Self {
            asset_a,
            asset_b,
            lookback,
            entry_z,
            exit_z,
        })
    }

    pub fn fit(&self, window: &PriceWindow<'_>) -> Result<SpreadFit, StrategyError> {
        let log_a: Vec<f64> = window
            .trailing_closes(&self.asset_a, self.lookback)?
            .iter()
            .map(|p| p.ln())
            .collect();
        let log_b: Vec<f64> = window
            .trailing_closes(&self.asset_b, self.lookback)?
            .iter()
            .map(|p| p.ln())
            .collect();

        let var_b = covariance(&log_b, &log_b);
        if var_b <= 0.0 || !var_b.is_finite() {
            return Err(StrategyError::Degenerate(format!(
                "'{}' has constant log price over the lookback",
                self.asset_b
            )));
        }
        let beta = covariance(&log_a, &log_b) / var_b;
        let alpha = mean(&log_a) - beta * mean(&log_b);

        let spread: Vec<f64> = log_a
            .iter()
            .zip(&log_b)
            .map(|(a, b)| a - alpha - beta * b)
            .collect();
        let sd = sample_std(&spread);
        if sd <= 0.0 || !sd.is_finite() {
            return Err(StrategyError::Degenerate("spread has zero dispersion".into()));
        }
        let last = spread[spread.len() - 1];
        Ok(SpreadFit {
            beta,
            z_score: (last - mean(&spread)) / sd,
        })
    }

    fn held(&self, prior: Option<&WeightVector>) -> SpreadPosition {
        let w = prior.map(|p| p.get(&self.asset_a)).unwrap_or(0.0);
        if w > 0.0 {
            SpreadPosition::Long
        } else if w < 0.0 {
            SpreadPosition::Short
        } else {
            SpreadPosition::Flat
        }
    }

    fn next_position(&self, held: SpreadPosition, z: f64) -> SpreadPosition {
        match held {
            SpreadPosition::Flat if z > self.entry_z => SpreadPosition::Short,
            SpreadPosition::Flat if z < -self.entry_z => SpreadPosition::Long,
            SpreadPosition::Long if z >= -self.exit_z => SpreadPosition::Flat,
            SpreadPosition::Short if z <= self.exit_z => SpreadPosition::Flat,
            other => other,
        }
    }
}

impl Strategy for PairsTrading {
    fn name(&self) -> &str {
        "pairs_trading"
    }

    fn min_history(&self) -> usize {
        self.lookback
    }

    fn exposure(&self) -> ExposureContract {
        ExposureContract {
            gross: GrossExposure::AtMost(1.0),
            allow_short: true,
        }
    }

    fn compute_weights(
        &mut self,
        window: &PriceWindow<'_>,
        prior: Option<&WeightVector>,
    ) -> Result<WeightVector, StrategyError> {
        window.require_history(self.lookback)?;
        let fit = self.fit(window)?;
        let position = self.next_position(self.held(prior), fit.z_score);

        let sign = match position {
            SpreadPosition::Flat => return Ok(WeightVector::new()),
            SpreadPosition::Long => 1.0,
            SpreadPosition::Short => -1.0,
        };
        let scale = 1.0 + fit.beta.abs();
        let mut weights = WeightVector::new();
        weights.set(self.asset_a.as_str(), sign / scale);
        weights.set(self.asset_b.as_str(), -sign * fit.beta / scale);
        Ok(weights)
    }
}
