//! Strategy factory: converts a serializable `StrategySpec` into a runtime
//! `Box<dyn Strategy>`, validating parameters on the way.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::{
    EqualWeight, FactorScore, MaCrossover, MarketCapWeight, MinimumVariance, PairsTrading,
    RiskParity, Strategy, WeightedFactor,
};

// ─── Spec ────────────────────────────────────────────────────────────

/// Strategy selection, tagged by kind.
///
/// ```toml
/// type = "MA_CROSSOVER"
/// fast_period = 20
/// slow_period = 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategySpec {
    EqualWeight {
        #[serde(default)]
        assets: Option<Vec<String>>,
    },
    MarketCap {
        #[serde(default)]
        assets: Option<Vec<String>>,
    },
    MaCrossover {
        #[serde(default = "default_fast")]
        fast_period: usize,
        #[serde(default = "default_slow")]
        slow_period: usize,
        #[serde(default)]
        allow_short: bool,
        #[serde(default)]
        assets: Option<Vec<String>>,
    },
    MinVariance {
        #[serde(default = "default_lookback")]
        lookback: usize,
        #[serde(default = "default_true")]
        long_only: bool,
        #[serde(default)]
        assets: Option<Vec<String>>,
    },
    RiskParity {
        #[serde(default = "default_lookback")]
        lookback: usize,
        #[serde(default)]
        assets: Option<Vec<String>>,
    },
    FactorScore {
        factors: Vec<WeightedFactor>,
        #[serde(default = "default_top_n")]
        top_n: usize,
        #[serde(default)]
        long_short: bool,
        #[serde(default)]
        assets: Option<Vec<String>>,
    },
    PairsTrading {
        asset_a: String,
        asset_b: String,
        #[serde(default = "default_lookback")]
        lookback: usize,
        #[serde(default = "default_entry_z")]
        entry_z: f64,
        #[serde(default = "default_exit_z")]
        exit_z: f64,
    },
}

fn default_fast() -> usize {
    20
}
fn default_slow() -> usize {
    50
}
fn default_lookback() -> usize {
    60
}
fn default_true() -> bool {
    true
}
fn default_top_n() -> usize {
    5
}
fn default_entry_z() -> f64 {
    2.0
}
fn default_exit_z() -> f64 {
    0.5
}

// ─── Factory ─────────────────────────────────────────────────────────

impl StrategySpec {
    /// Name the built strategy reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EqualWeight { .. } => "equal_weight",
            Self::MarketCap { .. } => "market_cap",
            Self::MaCrossover { .. } => "ma_crossover",
            Self::MinVariance { .. } => "min_variance",
            Self::RiskParity { .. } => "risk_parity",
            Self::FactorScore { .. } => "factor_score",
            Self::PairsTrading { .. } => "pairs_trading",
        }
    }

    pub fn build(&self) -> Result<Box<dyn Strategy>, ConfigError> {
        let strategy: Box<dyn Strategy> = match self.clone() {
            Self::EqualWeight { assets } => Box::new(EqualWeight::new(assets)),
            Self::MarketCap { assets } => Box::new(MarketCapWeight::new(assets)),
            Self::MaCrossover {
                fast_period,
                slow_period,
                allow_short,
                assets,
            } => Box::new(MaCrossover::new(fast_period, slow_period, allow_short, assets)?),
            Self::MinVariance {
                lookback,
                long_only,
                assets,
            } => Box::new(MinimumVariance::new(lookback, long_only, assets)?),
            Self::RiskParity { lookback, assets } => Box::new(RiskParity::new(lookback, assets)?),
            Self::FactorScore {
                factors,
                top_n,
                long_short,
                assets,
            } => Box::new(FactorScore::new(factors, top_n, long_short, assets)?),
            Self::PairsTrading {
                asset_a,
                asset_b,
                lookback,
                entry_z,
                exit_z,
            } => Box::new(PairsTrading::new(asset_a, asset_b, lookback, entry_z, exit_z)?),
        };
        Ok(strategy)
    }
}

impl Default for StrategySpec {
    fn default() -> Self {
        Self::EqualWeight { assets: None }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
