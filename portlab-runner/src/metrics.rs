//! Performance metrics: pure functions over return and equity series.
//!
//! Every metric takes plain slices and returns a scalar (or a small value
//! type). Nothing here knows about the engine, the batch runner or I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use portlab_core::numeric::{covariance, mean, sample_std};

/// Dispersion below this is treated as zero.
const EPSILON: f64 = 1e-15;

// ─── Return metrics ─────────────────────────────────────────────────

/// Compound a return series onto a starting equity.
pub fn equity_curve(initial: f64, returns: &[f64]) -> Vec<f64> {
    let mut equity = initial;
    returns
        .iter()
        .map(|r| {
            equity *= 1.0 + r;
            equity
        })
        .collect()
}

/// Total return as a fraction of `initial`.
pub fn total_return(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    final_equity / initial - 1.0
}

/// Geometric annualized return over `periods` observations.
pub fn annualized_return(total_return: f64, periods: usize, periods_per_year: f64) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(periods_per_year / periods as f64) - 1.0
}

/// Sample standard deviation scaled by `sqrt(periods_per_year)`.
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    sample_std(returns) * periods_per_year.sqrt()
}

/// Annualized Sharpe ratio. `risk_free_rate` is annual and is spread evenly
/// over `periods_per_year`.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - rf).collect();
    let std = sample_std(&excess);
    if std < EPSILON {
        return 0.0;
    }
    mean(&excess) / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio: downside deviation counts squared shortfalls
/// below the per-period risk-free rate over all observations.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let rf = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|r| r - rf).collect();
    let downside_sq: f64 = excess.iter().map(|e| e.min(0.0).powi(2)).sum();
    let downside = (downside_sq / excess.len() as f64).sqrt();
    if downside < EPSILON {
        return 0.0;
    }
    mean(&excess) / downside * periods_per_year.sqrt()
}

// ─── Drawdown ───────────────────────────────────────────────────────

/// Deepest peak-to-trough decline of an equity curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Decline as a negative fraction of the peak (0.0 when the curve never falls).
    pub depth: f64,
    pub peak: Option<NaiveDate>,
    pub trough: Option<NaiveDate>,
    /// First date the curve regained the peak, if it did.
    pub recovery: Option<NaiveDate>,
}

/// Maximum drawdown of `equity`, dated by the parallel `dates` slice.
pub fn max_drawdown(dates: &[NaiveDate], equity: &[f64]) -> Drawdown {
    debug_assert_eq!(dates.len(), equity.len());
    let n = dates.len().min(equity.len());
    if n == 0 {
        return Drawdown::default();
    }

    let mut running_peak = 0;
    let mut worst = 0.0;
    let mut worst_peak = 0;
    let mut worst_trough = 0;
    for i in 0..n {
        if equity[i] > equity[running_peak] {
            running_peak = i;
        }
        let peak_equity = equity[running_peak];
        if peak_equity <= 0.0 {
            continue;
        }
        let dd = equity[i] / peak_equity - 1.0;
        if dd < worst {
            worst = dd;
            worst_peak = running_peak;
            worst_trough = i;
        }
    }

    if worst >= 0.0 {
        return Drawdown::default();
    }
    let recovery = (worst_trough + 1..n)
        .find(|&i| equity[i] >= equity[worst_peak])
        .map(|i| dates[i]);
    Drawdown {
        depth: worst,
        peak: Some(dates[worst_peak]),
        trough: Some(dates[worst_trough]),
        recovery,
    }
}

/// Maximum drawdown measured from `initial` equity rather than from the
/// first observation.
///
/// The starting equity is dated at the first session, so a loss on that
/// session (the entry cost) counts against the true starting peak.
pub fn max_drawdown_from_start(initial: f64, dates: &[NaiveDate], equity: &[f64]) -> Drawdown {
    let Some(&first) = dates.first() else {
        return Drawdown::default();
    };
    let dated: Vec<NaiveDate> = std::iter::once(first).chain(dates.iter().copied()).collect();
    let curve: Vec<f64> = std::iter::once(initial).chain(equity.iter().copied()).collect();
    max_drawdown(&dated, &curve)
}

// ─── Tail risk ──────────────────────────────────────────────────────

/// Empirical quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Historical Value-at-Risk: the `(1 - confidence)` return quantile.
///
/// Reported as a return, so a loss threshold is negative.
pub fn historical_var(returns: &[f64], confidence: f64) -> f64 {
    quantile(returns, 1.0 - confidence)
}

/// Conditional VaR: mean of the returns at or below the VaR threshold.
pub fn historical_cvar(returns: &[f64], confidence: f64) -> f64 {
    let var = historical_var(returns, confidence);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    if tail.is_empty() {
        return var;
    }
    mean(&tail)
}

// ─── Relative metrics ───────────────────────────────────────────────

/// Pearson correlation; 0.0 when either series is flat.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let sa = sample_std(a);
    let sb = sample_std(b);
    if sa < EPSILON || sb < EPSILON {
        return 0.0;
    }
    covariance(a, b) / (sa * sb)
}

/// Annualized standard deviation of active returns `a - b`.
pub fn tracking_error(a: &[f64], b: &[f64], periods_per_year: f64) -> f64 {
    let active: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    annualized_volatility(&active, periods_per_year)
}

/// Annualized mean active return over tracking error; `None` when the two
/// series move identically.
pub fn information_ratio(a: &[f64], b: &[f64], periods_per_year: f64) -> Option<f64> {
    let active: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    let std = sample_std(&active);
    if std < EPSILON {
        return None;
    }
    Some(mean(&active) / std * periods_per_year.sqrt())
}
