//! Portfolio weight vectors and the exposure contracts strategies declare.
//!
//! Weights are fractions of current equity. Iteration order is the asset's
//! sort order, which keeps every sum over a vector bit-reproducible.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::{PriceWindow, MARKET_CAP};
use crate::error::WindowError;

/// Relative tolerance used when checking a declared gross exposure.
pub const EXPOSURE_TOLERANCE: f64 = 1e-9;

/// Mapping asset -> weight for one date. Absent assets hold zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(BTreeMap<String, f64>);

impl WeightVector {
    /// All cash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Equal long weights summing to `gross`.
    pub fn equal<S: AsRef<str>>(assets: &[S], gross: f64) -> Self {
        if assets.is_empty() {
            return Self::new();
        }
        let w = gross / assets.len() as f64;
        assets.iter().map(|a| (a.as_ref().to_string(), w)).collect()
    }

    pub fn get(&self, asset: &str) -> f64 {
        self.0.get(asset).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, asset: impl Into<String>, weight: f64) {
        self.0.insert(asset.into(), weight);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(a, w)| (a.as_str(), *w))
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|a| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every weight is exactly zero (or there are none).
    pub fn is_cash(&self) -> bool {
        self.0.values().all(|w| *w == 0.0)
    }

    /// Sum of absolute weights.
    pub fn gross_exposure(&self) -> f64 {
        self.0.values().map(|w| w.abs()).sum()
    }

    /// Sum of signed weights.
    pub fn net_exposure(&self) -> f64 {
        self.0.values().sum()
    }

    /// Sum over the union of assets of |self - prior|.
    ///
    /// An empty `prior` is the all-zero position.
    pub fn turnover_against(&self, prior: &WeightVector) -> f64 {
        let mut total = 0.0;
        for (asset, w) in &self.0 {
            total += (w - prior.get(asset)).abs();
        }
        for (asset, w) in &prior.0 {
            if !self.0.contains_key(asset) {
                total += w.abs();
            }
        }
        total
    }

    /// Weighted sum of per-asset returns. Assets without a return contribute 0.
    pub fn portfolio_return(&self, returns: &BTreeMap<String, f64>) -> f64 {
        self.0
            .iter()
            .map(|(asset, w)| w * returns.get(asset).copied().unwrap_or(0.0))
            .sum()
    }

    /// Buy-and-hold drift after one period of `returns`.
    ///
    /// `w_i' = w_i (1 + r_i) / (1 + sum_j w_j r_j)`; the cash sleeve
    /// `1 - net` earns nothing. A period that wipes out equity leaves the
    /// weights unchanged.
    pub fn drifted(&self, returns: &BTreeMap<String, f64>) -> WeightVector {
        let growth = 1.0 + self.portfolio_return(returns);
        if growth <= 0.0 || !growth.is_finite() {
            return self.clone();
        }
        self.0
            .iter()
            .map(|(asset, w)| {
                let r = returns.get(asset).copied().unwrap_or(0.0);
                (asset.clone(), w * (1.0 + r) / growth)
            })
            .collect()
    }

    /// Every weight multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> WeightVector {
        self.0.iter().map(|(a, w)| (a.clone(), w * factor)).collect()
    }

    /// Drop exact zeros.
    pub fn without_zeros(&self) -> WeightVector {
        self.0
            .iter()
            .filter(|(_, w)| **w != 0.0)
            .map(|(a, w)| (a.clone(), *w))
            .collect()
    }
}

impl FromIterator<(String, f64)> for WeightVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for WeightVector {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(a, w)| (a.to_string(), w)).collect())
    }
}

/// Gross exposure a strategy promises for every weight vector it emits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrossExposure {
    /// Sum of |w| equals the value (fully invested at that size).
    Exactly(f64),
    /// Sum of |w| never exceeds the value; zero means all cash.
    AtMost(f64),
    /// No constraint on size.
    Unconstrained,
}

/// Per-strategy declaration of the weights it may produce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureContract {
    pub gross: GrossExposure,
    pub allow_short: bool,
}

impl ExposureContract {
    /// Fully invested, long only, gross 1.0.
    pub const fn long_only() -> Self {
        Self {
            gross: GrossExposure::Exactly(1.0),
            allow_short: false,
        }
    }

    /// Check a weight vector against the contract. Returns a reason on failure.
    pub fn check(&self, weights: &WeightVector) -> Result<(), String> {
        for (asset, w) in weights.iter() {
            if !w.is_finite() {
                return Err(format!("non-finite weight {w} for '{asset}'"));
            }
            if w < 0.0 && !self.allow_short {
                return Err(format!("negative weight {w} for '{asset}' in a long-only strategy"));
            }
        }

        let gross = weights.gross_exposure();
        match self.gross {
            GrossExposure::Exactly(target) => {
                if (gross - target).abs() > EXPOSURE_TOLERANCE * target.abs().max(1.0) {
                    return Err(format!("gross exposure {gross} differs from required {target}"));
                }
            }
            GrossExposure::AtMost(limit) => {
                if gross > limit + EXPOSURE_TOLERANCE * limit.abs().max(1.0) {
                    return Err(format!("gross exposure {gross} exceeds limit {limit}"));
                }
            }
            GrossExposure::Unconstrained => {}
        }
        Ok(())
    }
}

/// How magnitudes are assigned to the positions a strategy selects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingScheme {
    /// Keep the strategy's own magnitudes.
    #[default]
    StrategyDefined,
    /// Same magnitude for every non-zero position.
    Equal,
    /// Magnitudes proportional to market capitalization at the as-of date.
    MarketCap,
}

impl WeightingScheme {
    /// Re-weight non-zero positions. Signs and gross exposure are preserved.
    pub fn apply(
        &self,
        weights: &WeightVector,
        window: &PriceWindow<'_>,
    ) -> Result<WeightVector, WindowError> {
        let active = weights.without_zeros();
        if active.is_empty() {
            return Ok(weights.clone());
        }
        let gross = active.gross_exposure();

        match self {
            Self::StrategyDefined => Ok(weights.clone()),
            Self::Equal => {
                let magnitude = gross / active.len() as f64;
                Ok(active
                    .iter()
                    .map(|(a, w)| (a, w.signum() * magnitude))
                    .collect())
            }
            Self::MarketCap => {
                let mut caps = Vec::with_capacity(active.len());
                for (asset, w) in active.iter() {
                    let cap = window.last_value(MARKET_CAP, asset)?;
                    caps.push((asset, w.signum(), cap.abs()));
                }
                let total: f64 = caps.iter().map(|(_, _, c)| c).sum();
                if total <= 0.0 {
                    // no usable capitalization for any selected asset
                    let asset = caps.first().map(|(a, _, _)| a.to_string()).unwrap_or_default();
                    return Err(WindowError::MissingData {
                        asset,
                        date: window.as_of(),
                    });
                }
                Ok(caps
                    .into_iter()
                    .map(|(a, sign, cap)| (a, sign * gross * cap / total))
                    .collect())
            }
        }
    }
}
