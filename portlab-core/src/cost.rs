//! Transaction cost model.
//!
//! Cost is proportional to turnover: `drag = turnover * (transaction_cost_rate
//! + slippage_rate)`, charged as a return drag on the rebalancing session.
//! Entering from cash is a full-turnover event; that is how entry costs are
//! charged.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::weights::WeightVector;

/// Turnover and resulting drag for one rebalancing event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostCharge {
    /// Sum of absolute weight changes.
    pub turnover: f64,
    /// Cost expressed as a fraction of equity.
    pub drag: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub transaction_cost_rate: f64,
    pub slippage_rate: f64,
}

impl CostModel {
    pub fn new(transaction_cost_rate: f64, slippage_rate: f64) -> Result<Self, ConfigError> {
        check_rate("transaction_cost_rate", transaction_cost_rate)?;
        check_rate("slippage_rate", slippage_rate)?;
        Ok(Self {
            transaction_cost_rate,
            slippage_rate,
        })
    }

    pub fn frictionless() -> Self {
        Self {
            transaction_cost_rate: 0.0,
            slippage_rate: 0.0,
        }
    }

    /// Combined per-unit-turnover rate.
    pub fn rate(&self) -> f64 {
        self.transaction_cost_rate + self.slippage_rate
    }

    /// Charge for moving from `prior` to `new`. An empty `prior` is cash.
    pub fn apply(&self, prior: &WeightVector, new: &WeightVector) -> CostCharge {
        let turnover = new.turnover_against(prior);
        CostCharge {
            turnover,
            drag: turnover * self.rate(),
        }
    }
}

pub(crate) fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeRate { name, value })
    }
}
