//! Multi-asset time alignment.
//!
//! Given close series for several assets, place them on the union of their
//! dates. An asset with no observation on a date gets `NaN` there; tradable
//! prices are never forward-filled.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::dataset::{DatasetError, PriceDataset};

/// Align per-asset `(date, close)` series onto a common timeline.
///
/// A series with two observations on the same date is rejected.
pub fn align_series(
    series: BTreeMap<String, Vec<(NaiveDate, f64)>>,
) -> Result<PriceDataset, DatasetError> {
    let dates: Vec<NaiveDate> = series
        .values()
        .flat_map(|obs| obs.iter().map(|(date, _)| *date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut closes = BTreeMap::new();
    for (asset, observations) in series {
        let mut by_date = HashMap::with_capacity(observations.len());
        for (date, close) in observations {
            if by_date.insert(date, close).is_some() {
                return Err(DatasetError::DuplicateDate { asset, date });
            }
        }
        let column = dates
            .iter()
            .map(|date| by_date.get(date).copied().unwrap_or(f64::NAN))
            .collect();
        closes.insert(asset, column);
    }

    PriceDataset::from_closes(dates, closes)
}

/// Fraction of `NaN` observations in each asset's close column.
pub fn missing_rates(dataset: &PriceDataset) -> BTreeMap<String, f64> {
    dataset
        .assets()
        .iter()
        .filter_map(|asset| {
            let column = dataset.closes(asset)?;
            let missing = column.iter().filter(|v| !v.is_finite()).count();
            Some((asset.clone(), missing as f64 / column.len() as f64))
        })
        .collect()
}
