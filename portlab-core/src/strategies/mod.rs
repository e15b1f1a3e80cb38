//! Allocation strategies.
//!
//! A strategy has one capability: given a causally-bounded price window and the
//! weights currently held, produce target weights for the as-of date. The
//! engine never special-cases a strategy kind; selection is polymorphism over
//! [`Strategy`], with [`StrategySpec`] as the serializable tag.
//!
//! # Architecture invariant
//! `compute_weights` receives a [`PriceWindow`] and nothing else about time.
//! Any fitted state (hedge ratios, covariance estimates) must be recomputed
//! from that window on every call.

pub mod equal_weight;
pub mod factor;
pub mod factory;
pub mod ma_crossover;
pub mod market_cap;
pub mod min_variance;
pub mod pairs;
pub mod risk_parity;

pub use equal_weight::EqualWeight;
pub use factor::{FactorInput, FactorScore, WeightedFactor};
pub use factory::StrategySpec;
pub use ma_crossover::MaCrossover;
pub use market_cap::MarketCapWeight;
pub use min_variance::MinimumVariance;
pub use pairs::PairsTrading;
pub use risk_parity::RiskParity;

use crate::data::PriceWindow;
use crate::error::{StrategyError, WindowError};
use crate::weights::{ExposureContract, WeightVector};

pub trait Strategy: Send {
    /// Identifier used in logs, errors and results (e.g. "min_variance").
    fn name(&self) -> &str;

    /// Minimum number of visible observations needed to produce weights.
    fn min_history(&self) -> usize;

    /// The weights this strategy promises to emit.
    fn exposure(&self) -> ExposureContract;

    /// Target weights for `window.as_of()`.
    ///
    /// `prior` is the position currently held (after drift), `None` before the
    /// first allocation.
    fn compute_weights(
        &mut self,
        window: &PriceWindow<'_>,
        prior: Option<&WeightVector>,
    ) -> Result<WeightVector, StrategyError>;
}

/// Resolve the asset universe: an explicit list (validated against the window)
/// or every asset in the window.
pub(crate) fn resolve_universe(
    window: &PriceWindow<'_>,
    assets: &Option<Vec<String>>,
) -> Result<Vec<String>, WindowError> {
    match assets {
        Some(list) => {
            for asset in list {
                if !window.has_asset(asset) {
                    return Err(WindowError::UnknownAsset(asset.clone()));
                }
            }
            Ok(list.clone())
        }
        None => Ok(window.assets().to_vec()),
    }
}

/// Trailing return columns for each asset, in universe order.
pub(crate) fn return_columns(
    window: &PriceWindow<'_>,
    universe: &[String],
    lookback: usize,
) -> Result<Vec<Vec<f64>>, WindowError> {
    universe
        .iter()
        .map(|asset| window.trailing_returns(asset, lookback))
        .collect()
}
