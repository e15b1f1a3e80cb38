//! Capitalization weighting from the `market_cap` field.

use crate::data::{PriceWindow, MARKET_CAP};
use crate::error::StrategyError;
use crate::weights::{ExposureContract, WeightVector};

use super::{resolve_universe, Strategy};

#[derive(Debug, Clone, Default)]
pub struct MarketCapWeight {
    assets: Option<Vec<String>>,
}

impl MarketCapWeight {
    pub fn new(assets: Option<Vec<String>>) -> Self {
        Self { assets }
    }
}

impl Strategy for MarketCapWeight {
    fn name(&self) -> &str {
        "market_cap"
    }

    fn min_history(&self) -> usize {
        1
    }

    fn exposure(&self) -> ExposureContract {
        ExposureContract::long_only()
    }

    fn compute_weights(
        &mut self,
        window: &PriceWindow<'_>,
        _prior: Option<&WeightVector>,
    ) -> Result<WeightVector, StrategyError> {
        let universe = resolve_universe(window, &self.assets)?;
        let mut caps = Vec::with_capacity(universe.len());
        for asset in &universe {
            window.last_close(asset)?;
            let cap = window.last_value(MARKET_CAP, asset)?;
            if cap < 0.0 {
                return Err(StrategyError::Degenerate(format!(
                    "negative market cap {cap} for '{asset}'"
                )));
            }
            caps.push(cap);
        }

        let total: f64 = caps.iter().sum();
        if total <= 0.0 {
            return Err(StrategyError::Degenerate(
                "total market cap is zero".into(),
            ));
        }
        Ok(universe
            .into_iter()
            .zip(caps)
            .map(|(asset, cap)| (asset, cap / total))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceDataset;
    use crate::error::WindowError;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn dataset(with_caps: bool) -> PriceDataset {
        let dates = vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()];
        let mut fields = BTreeMap::new();
        let mut closes = BTreeMap::new();
        closes.insert("A".to_string(), vec![10.0]);
        closes.insert("B".to_string(), vec![10.0]);
        fields.insert("close".to_string(), closes);
        if with_caps {
            let mut caps = BTreeMap::new();
            caps.insert("A".to_string(), vec![3.0e9]);
            caps.insert("B".to_string(), vec![1.0e9]);
            fields.insert(MARKET_CAP.to_string(), caps);
        }
        PriceDataset::from_fields(dates, fields).unwrap()
    }

    #[test]
    fn proportional_to_caps() {
        let ds = dataset(true);
        let w = MarketCapWeight::default()
            .compute_weights(&ds.window(0), None)
            .unwrap();
        assert!((w.get("A") - 0.75).abs() < 1e-12);
        assert!((w.get("B") - 0.25).abs() < 1e-12);
    }

    #[test]
    fn missing_cap_field_is_missing_data() {
        let ds = dataset(false);
        let err = MarketCapWeight::default()
            .compute_weights(&ds.window(0), None)
            .unwrap_err();
        assert!(matches!(
            err,
            StrategyError::Window(WindowError::MissingData { .. })
        ));
    }
}
