//! Equal weighting across a fixed universe.

use crate::data::PriceWindow;
use crate::error::StrategyError;
use crate::weights::{ExposureContract, WeightVector};

use super::{resolve_universe, Strategy};

#[derive(Debug, Clone, Default)]
pub struct EqualWeight {
    /// Restrict to these assets; `None` means every asset in the dataset.
    assets: Option<Vec<String>>,
}

impl EqualWeight {
    pub fn new(assets: Option<Vec<String>>) -> Self {
        Self { assets }
    }
}

impl Strategy for EqualWeight {
    fn name(&self) -> &str {
        "equal_weight"
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
        for asset in &universe {
            window.last_close(asset)?;
        }
        Ok(WeightVector::equal(&universe, 1.0))
    }
}
