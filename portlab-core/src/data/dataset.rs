//! Immutable, date-indexed price table.
//!
//! Columnar layout: one `Vec<f64>` per (field, asset), each the same length as
//! the date axis. Missing observations are `NaN` and are never forward-filled.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::window::PriceWindow;

/// Name of the mandatory price field.
pub const CLOSE: &str = "close";

/// Name of the optional capitalization field used by cap weighting.
pub const MARKET_CAP: &str = "market_cap";

/// Structural problems found while building a dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("dataset has no dates")]
    Empty,

    #[error("dates must be strictly ascending: {prev} is followed by {next}")]
    NotAscending { prev: NaiveDate, next: NaiveDate },

    #[error("column {field}/{asset} has {actual} rows, expected {expected}")]
    LengthMismatch {
        field: String,
        asset: String,
        expected: usize,
        actual: usize,
    },

    #[error("asset '{0}' has no close column")]
    MissingClose(String),

    #[error("asset '{asset}' has more than one observation on {date}")]
    DuplicateDate { asset: String, date: NaiveDate },
}

/// Date-indexed table of per-asset observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDataset {
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    /// field -> asset -> column
    fields: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
}

impl PriceDataset {
    /// Build a dataset holding only close prices.
    pub fn from_closes(
        dates: Vec<NaiveDate>,
        closes: BTreeMap<String, Vec<f64>>,
    ) -> Result<Self, DatasetError> {
        let mut fields = BTreeMap::new();
        fields.insert(CLOSE.to_string(), closes);
        Self::from_fields(dates, fields)
    }

    /// Build a dataset from named fields. `close` is required for every asset
    /// that appears in any field.
    pub fn from_fields(
        dates: Vec<NaiveDate>,
        fields: BTreeMap<String, BTreeMap<String, Vec<f64>>>,
    ) -> Result<Self, DatasetError> {
        if dates.is_empty() {
            return Err(DatasetError::Empty);
        }
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(DatasetError::NotAscending {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }

        for (field, columns) in &fields {
            for (asset, column) in columns {
                if column.len() != dates.len() {
                    return Err(DatasetError::LengthMismatch {
                        field: field.clone(),
                        asset: asset.clone(),
                        expected: dates.len(),
                        actual: column.len(),
                    });
                }
            }
        }

        let closes = fields.get(CLOSE);
        let mut assets: Vec<String> = fields
            .values()
            .flat_map(|columns| columns.keys().cloned())
            .collect();
        assets.sort();
        assets.dedup();
        for asset in &assets {
            if !closes.is_some_and(|c| c.contains_key(asset)) {
                return Err(DatasetError::MissingClose(asset.clone()));
            }
        }

        Ok(Self {
            dates,
            assets,
            fields,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Asset identifiers in sorted order.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn has_asset(&self, asset: &str) -> bool {
        self.assets.binary_search_by(|a| a.as_str().cmp(asset)).is_ok()
    }

    /// Names of all fields present.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    /// Full close column for an asset.
    pub fn closes(&self, asset: &str) -> Option<&[f64]> {
        self.field(CLOSE, asset)
    }

    /// Full column for any named field.
    pub fn field(&self, field: &str, asset: &str) -> Option<&[f64]> {
        self.fields
            .get(field)
            .and_then(|columns| columns.get(asset))
            .map(|c| c.as_slice())
    }

    /// Row index of a date, if present.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Causally-bounded view over rows `0..=as_of_index`.
    ///
    /// # Panics
    /// Panics if `as_of_index` is out of range.
    pub fn window(&self, as_of_index: usize) -> PriceWindow<'_> {
        assert!(
            as_of_index < self.dates.len(),
            "window index {as_of_index} out of range for {} rows",
            self.dates.len()
        );
        PriceWindow::new(self, as_of_index)
    }

    /// A copy holding only rows dated on or before `date`.
    ///
    /// Returns `None` if no row qualifies.
    pub fn truncated_through(&self, date: NaiveDate) -> Option<Self> {
        let end = self.dates.partition_point(|d| *d <= date);
        if end == 0 {
            return None;
        }
        let fields = self
            .fields
            .iter()
            .map(|(field, columns)| {
                let cut = columns
                    .iter()
                    .map(|(asset, column)| (asset.clone(), column[..end].to_vec()))
                    .collect();
                (field.clone(), cut)
            })
            .collect();
        Some(Self {
            dates: self.dates[..end].to_vec(),
            assets: self.assets.clone(),
            fields,
        })
    }

    /// Iterate every (field, asset, column) triple in deterministic order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str, &[f64])> {
        self.fields.iter().flat_map(|(field, columns)| {
            columns
                .iter()
                .map(move |(asset, col)| (field.as_str(), asset.as_str(), col.as_slice()))
        })
    }
}
