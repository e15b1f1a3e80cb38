//! Causally-bounded view of a [`PriceDataset`].
//!
//! A window evaluated at row `t` exposes rows `0..=t` and nothing else. Every
//! accessor slices through `end`, so a strategy holding a `PriceWindow` has no
//! way to observe a later row.

use chrono::NaiveDate;

use super::dataset::{PriceDataset, CLOSE};
use crate::error::WindowError;

#[derive(Debug, Clone, Copy)]
pub struct PriceWindow<'a> {
    dataset: &'a PriceDataset,
    /// Inclusive as-of row.
    end: usize,
}

impl<'a> PriceWindow<'a> {
    pub(crate) fn new(dataset: &'a PriceDataset, end: usize) -> Self {
        Self { dataset, end }
    }

    /// The date the window is evaluated at.
    pub fn as_of(&self) -> NaiveDate {
        self.dataset.dates()[self.end]
    }

    /// Number of visible observations.
    pub fn len(&self) -> usize {
        self.end + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn dates(&self) -> &'a [NaiveDate] {
        &self.dataset.dates()[..=self.end]
    }

    pub fn assets(&self) -> &'a [String] {
        self.dataset.assets()
    }

    pub fn has_asset(&self, asset: &str) -> bool {
        self.dataset.has_asset(asset)
    }

    /// Visible close prices for an asset.
    pub fn closes(&self, asset: &str) -> Result<&'a [f64], WindowError> {
        self.field(CLOSE, asset)
    }

    /// Visible values of any named field for an asset.
    pub fn field(&self, field: &str, asset: &str) -> Result<&'a [f64], WindowError> {
        if !self.dataset.has_asset(asset) {
            return Err(WindowError::UnknownAsset(asset.to_string()));
        }
        self.dataset
            .field(field, asset)
            .map(|column| &column[..=self.end])
            .ok_or_else(|| WindowError::MissingData {
                asset: asset.to_string(),
                date: self.as_of(),
            })
    }

    /// Value of a field at the as-of date. `NaN` is reported as missing.
    pub fn last_value(&self, field: &str, asset: &str) -> Result<f64, WindowError> {
        let column = self.field(field, asset)?;
        let value = column[self.end];
        if value.is_finite() {
            Ok(value)
        } else {
            Err(WindowError::MissingData {
                asset: asset.to_string(),
                date: self.as_of(),
            })
        }
    }

    /// Close at the as-of date.
    pub fn last_close(&self, asset: &str) -> Result<f64, WindowError> {
        self.last_value(CLOSE, asset)
    }

    /// Fails unless at least `required` observations are visible.
    pub fn require_history(&self, required: usize) -> Result<(), WindowError> {
        if self.len() < required {
            return Err(WindowError::InsufficientHistory {
                required,
                available: self.len(),
            });
        }
        Ok(())
    }

    /// The last `n` closes, all finite.
    pub fn trailing_closes(&self, asset: &str, n: usize) -> Result<&'a [f64], WindowError> {
        let closes = self.closes(asset)?;
        self.require_history(n)?;
        let start = closes.len() - n;
        let tail = &closes[start..];
        if let Some(offset) = tail.iter().position(|v| !v.is_finite()) {
            return Err(WindowError::MissingData {
                asset: asset.to_string(),
                date: self.dataset.dates()[start + offset],
            });
        }
        Ok(tail)
    }

    /// The last `n` simple close-to-close returns (needs `n + 1` closes).
    pub fn trailing_returns(&self, asset: &str, n: usize) -> Result<Vec<f64>, WindowError> {
        let closes = self.trailing_closes(asset, n + 1)?;
        Ok(closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect())
    }
}
