//! Experiment configuration loaded from TOML.
//!
//! ```toml
//! [engine]
//! rebalancing_frequency = { type = "WEEKLY" }
//! transaction_cost_rate = 0.001
//!
//! [statistics]
//! var_confidence = 0.99
//!
//! [[strategies]]
//! label = "ew"
//! type = "EQUAL_WEIGHT"
//!
//! [[strategies]]
//! label = "trend"
//! type = "MA_CROSSOVER"
//! fast_period = 10
//! slow_period = 40
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use portlab_core::engine::EngineConfig;
use portlab_core::error::ConfigError;
use portlab_core::strategies::StrategySpec;

use crate::runner::RunJob;

/// Unique identifier for a run (content-addressed hash).
pub type RunId = String;

/// Errors from loading or validating an experiment file.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid experiment TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("experiment defines no strategies")]
    NoStrategies,

    #[error("duplicate strategy label '{0}'")]
    DuplicateLabel(String),

    #[error("unknown strategy label '{0}'")]
    UnknownLabel(String),

    #[error("var_confidence must be in (0, 1), got {0}")]
    InvalidVarConfidence(f64),

    #[error("engine config: {0}")]
    Engine(#[from] ConfigError),

    #[error("strategy '{label}': {source}")]
    Strategy {
        label: String,
        #[source]
        source: ConfigError,
    },
}

/// Settings for derived statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Confidence level of historical VaR and CVaR.
    pub var_confidence: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            var_confidence: 0.95,
        }
    }
}

impl StatisticsConfig {
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            return Err(ExperimentError::InvalidVarConfidence(self.var_confidence));
        }
        Ok(())
    }
}

/// A strategy entry: a unique label plus the tagged strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStrategy {
    pub label: String,
    #[serde(flatten)]
    pub spec: StrategySpec,
}

/// One experiment: shared engine and statistics settings, several strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub strategies: Vec<LabeledStrategy>,
}

impl ExperimentConfig {
    /// Parse and validate an experiment from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ExperimentError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate an experiment file.
    pub fn load(path: &Path) -> Result<Self, ExperimentError> {
        let text = std::fs::read_to_string(path).map_err(|source| ExperimentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check engine settings, statistics settings, label uniqueness and that
    /// every strategy builds.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        self.engine.validate()?;
        self.statistics.validate()?;
        if self.strategies.is_empty() {
            return Err(ExperimentError::NoStrategies);
        }
        let mut seen = BTreeSet::new();
        for entry in &self.strategies {
            if !seen.insert(entry.label.as_str()) {
                return Err(ExperimentError::DuplicateLabel(entry.label.clone()));
            }
            entry
                .spec
                .build()
                .map_err(|source| ExperimentError::Strategy {
                    label: entry.label.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// One job per strategy, in file order.
    pub fn jobs(&self) -> Vec<RunJob> {
        self.strategies.iter().map(|s| self.job_for(s)).collect()
    }

    /// The job for `label`.
    pub fn job(&self, label: &str) -> Result<RunJob, ExperimentError> {
        self.strategies
            .iter()
            .find(|s| s.label == label)
            .map(|s| self.job_for(s))
            .ok_or_else(|| ExperimentError::UnknownLabel(label.to_string()))
    }

    fn job_for(&self, entry: &LabeledStrategy) -> RunJob {
        RunJob {
            label: entry.label.clone(),
            spec: entry.spec.clone(),
            engine: self.engine.clone(),
            statistics: self.statistics,
        }
    }
}

/// Everything that determines a run's records and statistics.
#[derive(Debug, Serialize)]
pub struct RunConfig<'a> {
    pub spec: &'a StrategySpec,
    pub engine: &'a EngineConfig,
    pub statistics: &'a StatisticsConfig,
    pub dataset_hash: &'a str,
}

impl RunConfig<'_> {
    /// Deterministic hash ID: identical configs on identical data share it.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}
