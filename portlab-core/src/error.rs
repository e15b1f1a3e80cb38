//! Error taxonomy for the engine.
//!
//! Configuration problems are rejected before a run starts. Everything that
//! goes wrong mid-run is an [`EngineError`] carrying the session date and,
//! where a strategy was involved, its name.

use chrono::NaiveDate;
use thiserror::Error;

use crate::engine::RunState;

/// Invalid or contradictory configuration. Always raised before `Running`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a finite non-negative rate, got {value}")]
    NegativeRate { name: &'static str, value: f64 },

    #[error("risk-free rate must be finite, got {0}")]
    InvalidRiskFreeRate(f64),

    #[error("volatility target must be positive and finite, got {0}")]
    InvalidVolTarget(f64),

    #[error("volatility lookback must be at least 2 sessions, got {0}")]
    InvalidVolLookback(usize),

    #[error("max leverage must be positive and finite, got {0}")]
    InvalidMaxLeverage(f64),

    #[error("initial equity must be positive and finite, got {0}")]
    InvalidInitialEquity(f64),

    #[error("periods per year must be positive and finite, got {0}")]
    InvalidPeriodsPerYear(f64),

    #[error("custom rebalancing frequency must be at least 1 session")]
    ZeroSessionFrequency,

    #[error("trading calendar has no sessions")]
    EmptyCalendar,

    #[error("special start offset {offset} leaves no sessions (calendar has {sessions})")]
    OffsetBeyondHorizon { offset: usize, sessions: usize },

    #[error("calendar session {0} is not present in the dataset")]
    SessionNotInDataset(NaiveDate),

    #[error("invalid strategy parameter: {0}")]
    InvalidStrategyParameter(String),
}

/// Failures reading a causally-bounded price window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("insufficient history: {required} observations required, {available} available")]
    InsufficientHistory { required: usize, available: usize },

    #[error("unknown asset '{0}'")]
    UnknownAsset(String),

    #[error("missing data for '{asset}' on {date}")]
    MissingData { asset: String, date: NaiveDate },
}

/// Failures raised by a strategy while computing target weights.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Window(#[from] WindowError),

    /// The fitted model has no well-defined solution (singular covariance,
    /// zero volatility, constant spread).
    #[error("degenerate input: {0}")]
    Degenerate(String),
}

impl StrategyError {
    pub fn is_insufficient_history(&self) -> bool {
        matches!(
            self,
            Self::Window(WindowError::InsufficientHistory { .. })
        )
    }
}

/// Fatal conditions that move a run to `Failed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("strategy '{strategy}' failed on {date}: {source}")]
    Strategy {
        date: NaiveDate,
        strategy: String,
        #[source]
        source: StrategyError,
    },

    #[error("strategy '{strategy}' returned malformed weights on {date}: {reason}")]
    MalformedWeights {
        date: NaiveDate,
        strategy: String,
        reason: String,
    },

    #[error("unknown asset '{asset}' on {date}")]
    UnknownAsset { date: NaiveDate, asset: String },

    #[error("missing data for '{asset}' on {date}")]
    MissingData { date: NaiveDate, asset: String },

    #[error("backtester already ran (state: {0:?})")]
    AlreadyRun(RunState),
}

impl EngineError {
    /// Session date the failure is attributed to, if any.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Strategy { date, .. }
            | Self::MalformedWeights { date, .. }
            | Self::UnknownAsset { date, .. }
            | Self::MissingData { date, .. } => Some(*date),
            Self::Config(_) | Self::AlreadyRun(_) => None,
        }
    }

    /// Lift a window error raised outside a strategy into the engine taxonomy.
    pub(crate) fn from_window(date: NaiveDate, err: WindowError) -> Self {
        match err {
            WindowError::UnknownAsset(asset) => Self::UnknownAsset { date, asset },
            WindowError::MissingData { asset, date } => Self::MissingData { date, asset },
            WindowError::InsufficientHistory { .. } => Self::Strategy {
                date,
                strategy: "volatility_target".into(),
                source: StrategyError::Window(err),
            },
        }
    }
}
