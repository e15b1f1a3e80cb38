//! Cross-sectional factor scoring.
//!
//! Each factor is computed for every asset at the as-of date and turned into a
//! cross-sectional z-score. The composite score is the weighted sum of those
//! z-scores. The top `top_n` assets are held long in equal size; with
//! `long_short` the bottom `top_n` are also held short and each side carries
//! half of the book.
//!
//! Fundamental factors (quality, value) come from named dataset fields such as
//! `roe` or `book_to_price`, where a higher value is better. Price factors are
//! derived from closes.

use serde::{Deserialize, Serialize};

use crate::data::PriceWindow;
use crate::error::{ConfigError, StrategyError};
use crate::numeric::{mean, sample_std};
use crate::weights::{ExposureContract, GrossExposure, WeightVector};

use super::{resolve_universe, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorInput {
    /// Value of a dataset field at the as-of date (higher is better).
    Field { name: String },
    /// Trailing total return over `lookback` sessions.
    Momentum { lookback: usize },
    /// Negated sample volatility of the last `lookback` returns.
    LowVolatility { lookback: usize },
}

impl FactorInput {
    fn min_history(&self) -> usize {
        match self {
            Self::Field { .. } => 1,
            Self::Momentum { lookback } | Self::LowVolatility { lookback } => lookback + 1,
        }
    }

    fn raw_value(&self, window: &PriceWindow<'_>, asset: &str) -> Result<f64, StrategyError> {
        Ok(match self {
            Self::Field { name } => window.last_value(name, asset)?,
            Self::Momentum { lookback } => {
                let closes = window.trailing_closes(asset, lookback + 1)?;
                closes[closes.len() - 1] / closes[0] - 1.0
            }
            Self::LowVolatility { lookback } => {
                -sample_std(&window.trailing_returns(asset, *lookback)?)
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedFactor {
    #[serde(flatten)]
    pub input: FactorInput,
    #[serde(default = "default_factor_weight")]
    pub weight: f64,
}

fn default_factor_weight() -> f64 {
    1.0
}

/// Cross-sectional z-scores. A factor with no dispersion scores zero everywhere.
fn z_scores(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let sd = sample_std(values);
    if sd <= 0.0 || !sd.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - m) / sd).collect()
}

#[derive(Debug, Clone)]
pub struct FactorScore {
    pub factors: Vec<WeightedFactor>,
    pub top_n: usize,
    pub long_short: bool,
    assets: Option<Vec<String>>,
}

impl FactorScore {
    pub fn new(
        factors: Vec<WeightedFactor>,
        top_n: usize,
        long_short: bool,
        assets: Option<Vec<String>>,
    ) -> Result<Self, ConfigError> {
        if factors.is_empty() {
            return Err(ConfigError::InvalidStrategyParameter(
                "factor_score needs at least one factor".into(),
            ));
        }
        if top_n == 0 {
            return Err(ConfigError::InvalidStrategyParameter(
                "factor_score top_n must be >= 1".into(),
            ));
        }
        for f in &factors {
            if !f.weight.is_finite() {
                return Err(ConfigError::InvalidStrategyParameter(format!(
                    "factor weight must be finite, got {}",
                    f.weight
                )));
            }
            if let FactorInput::Momentum { lookback: 0 } | FactorInput::LowVolatility { lookback: 0 | 1 } =
                f.input
            {
                return Err(ConfigError::InvalidStrategyParameter(format!(
                    "factor lookback too short: {:?}",
                    f.input
                )));
            }
        }
        Ok(Self {
            factors,
            top_n,
            long_short,
            assets,
        })
    }

    /// Composite score per asset, in universe order.
    pub fn scores(
        &self,
        window: &PriceWindow<'_>,
        universe: &[String],
    ) -> Result<Vec<f64>, StrategyError> {
        let mut composite = vec![0.0; universe.len()];
        for factor in &self.factors {
            let mut raw = Vec::with_capacity(universe.len());
            for asset in universe {
                raw.push(factor.input.raw_value(window, asset)?);
            }
            for (c, z) in composite.iter_mut().zip(z_scores(&raw)) {
                *c += factor.weight * z;
            }
        }
        Ok(composite)
    }
}

impl Strategy for FactorScore {
    fn name(&self) -> &str {
        "factor_score"
    }

    fn min_history(&self) -> usize {
        self.factors
            .iter()
            .map(|f| f.input.min_history())
            .max()
            .unwrap_or(1)
    }

    fn exposure(&self) -> ExposureContract {
        ExposureContract {
            gross: GrossExposure::Exactly(1.0),
            allow_short: self.long_short,
        }
    }

    fn compute_weights(
        &mut self,
        window: &PriceWindow<'_>,
        _prior: Option<&WeightVector>,
    ) -> Result<WeightVector, StrategyError> {
        window.require_history(self.min_history())?;
        let universe = resolve_universe(window, &self.assets)?;
        let needed = if self.long_short { 2 * self.top_n } else { self.top_n };
        if universe.len() < needed {
            return Err(StrategyError::Degenerate(format!(
                "universe of {} assets cannot fill {needed} factor positions",
                universe.len()
            )));
        }
        for asset in &universe {
            window.last_close(asset)?;
        }

        let scores = self.scores(window, &universe)?;
        // Highest score first; ties broken by asset name.
        let mut ranked: Vec<(&String, f64)> = universe.iter().zip(scores).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let side = if self.long_short { 0.5 } else { 1.0 };
        let size = side / self.top_n as f64;
        let mut weights = WeightVector::new();
        for (asset, _) in ranked.iter().take(self.top_n) {
            weights.set(asset.as_str(), size);
        }
        if self.long_short {
            for (asset, _) in ranked.iter().rev().take(self.top_n) {
                weights.set(asset.as_str(), -size);
            }
        }
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceDataset;
    use crate::strategies::test_support::{dataset, path};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn momentum(lookback: usize) -> WeightedFactor {
        WeightedFactor {
            input: FactorInput::Momentum { lookback },
            weight: 1.0,
        }
    }

    fn trending() -> PriceDataset {
        dataset(&[
            ("A", path(30, 0.010, 0.0)),
            ("B", path(30, 0.005, 0.0)),
            ("C", path(30, -0.005, 0.0)),
            ("D", path(30, -0.010, 0.0)),
        ])
    }

    #[test]
    fn long_only_holds_top_bucket() {
        let ds = trending();
        let mut s = FactorScore::new(vec![momentum(20)], 2, false, None).unwrap();
        let w = s.compute_weights(&ds.window(29), None).unwrap();
        assert_eq!(w.get("A"), 0.5);
        assert_eq!(w.get("B"), 0.5);
        assert_eq!(w.get("D"), 0.0);
        assert!(s.exposure().check(&w).is_ok());
    }

    #[test]
    fn long_short_splits_book() {
        let ds = trending();
        let mut s = FactorScore::new(vec![momentum(20)], 1, true, None).unwrap();
        let w = s.compute_weights(&ds.window(29), None).unwrap();
        assert_eq!(w.get("A"), 0.5);
        assert_eq!(w.get("D"), -0.5);
        assert!((w.gross_exposure() - 1.0).abs() < 1e-12);
        assert!(w.net_exposure().abs() < 1e-12);
    }

    #[test]
    fn ties_break_by_name() {
        let ds = dataset(&[("Z", vec![100.0; 10]), ("M", vec![100.0; 10]), ("A", vec![100.0; 10])]);
        let mut s = FactorScore::new(vec![momentum(5)], 1, false, None).unwrap();
        let w = s.compute_weights(&ds.window(9), None).unwrap();
        assert_eq!(w.get("A"), 1.0);
    }

    #[test]
    fn field_factors_combine() {
        let dates = vec![NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()];
        let mut fields = BTreeMap::new();
        let col = |vals: [f64; 3]| -> BTreeMap<String, Vec<f64>> {
            ["A", "B", "C"]
                .iter()
                .zip(vals)
                .map(|(a, v)| (a.to_string(), vec![v]))
                .collect()
        };
        fields.insert("close".to_string(), col([10.0, 10.0, 10.0]));
        fields.insert("roe".to_string(), col([0.05, 0.20, 0.10]));
        fields.insert("book_to_price".to_string(), col([0.9, 0.1, 0.5]));
        let ds = PriceDataset::from_fields(dates, fields).unwrap();

        let factors = vec![
            WeightedFactor {
                input: FactorInput::Field { name: "roe".into() },
                weight: 1.0,
            },
            WeightedFactor {
                input: FactorInput::Field {
                    name: "book_to_price".into(),
                },
                weight: 0.25,
            },
        ];
        let mut s = FactorScore::new(factors, 1, false, None).unwrap();
        let w = s.compute_weights(&ds.window(0), None).unwrap();
        assert_eq!(w.get("B"), 1.0);
    }

    #[test]
    fn too_small_universe_is_degenerate() {
        let ds = dataset(&[("A", path(30, 0.01, 0.0))]);
        let mut s = FactorScore::new(vec![momentum(5)], 1, true, None).unwrap();
        assert!(matches!(
            s.compute_weights(&ds.window(29), None),
            Err(StrategyError::Degenerate(_))
        ));
    }

    #[test]
    fn weight_defaults_to_one() {
        let f: WeightedFactor = serde_json::from_str(r#"{"type":"MOMENTUM","lookback":60}"#).unwrap();
        assert_eq!(f.weight, 1.0);
        assert_eq!(f.input, FactorInput::Momentum { lookback: 60 });
    }
}
