//! Trade statistics derived from rebalancing decisions.
//!
//! A trade is a change in an asset's target weight at a rebalance. When the
//! change replaces an existing position, that position is scored: it won if
//! it gained over the holding period (long and the price rose, or short and
//! the price fell).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::weights::WeightVector;

/// Target weights closer than this count as unchanged.
const WEIGHT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    /// Target-weight changes across all rebalances.
    pub trades: usize,
    /// Positions closed or resized, i.e. trades that were scored.
    pub scored: usize,
    pub wins: usize,
}

impl TradeStats {
    /// Fraction of scored positions that won; `None` before any was scored.
    pub fn win_rate(&self) -> Option<f64> {
        (self.scored > 0).then(|| self.wins as f64 / self.scored as f64)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    target: f64,
    entry_price: f64,
}

/// Tracks open target positions across rebalances.
#[derive(Debug, Default)]
pub(crate) struct TradeTracker {
    open: BTreeMap<String, OpenPosition>,
    stats: TradeStats,
}

impl TradeTracker {
    /// Record a rebalance to `targets`, pricing each asset with `price`.
    pub(crate) fn on_rebalance<F>(&mut self, targets: &WeightVector, price: F)
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut assets: Vec<String> = self.open.keys().cloned().collect();
        assets.extend(targets.assets().map(str::to_string));
        assets.sort();
        assets.dedup();

        for asset in assets {
            let new_target = targets.get(&asset);
            let previous = self.open.get(&asset).copied();
            let old_target = previous.map(|p| p.target).unwrap_or(0.0);
            if (new_target - old_target).abs() <= WEIGHT_EPSILON {
                continue;
            }
            let Some(now) = price(&asset).filter(|p| p.is_finite() && *p > 0.0) else {
                continue;
            };

            self.stats.trades += 1;
            if let Some(held) = previous {
                self.stats.scored += 1;
                let move_ = now / held.entry_price - 1.0;
                if held.target.signum() * move_ > 0.0 {
                    self.stats.wins += 1;
                }
            }

            if new_target == 0.0 {
                self.open.remove(&asset);
            } else {
                self.open.insert(
                    asset,
                    OpenPosition {
                        target: new_target,
                        entry_price: now,
                    },
                );
            }
        }
    }

    pub(crate) fn finish(self) -> TradeStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wv(pairs: &[(&str, f64)]) -> WeightVector {
        pairs.iter().copied().collect()
    }

    #[test]
    fn entry_is_a_trade_but_not_scored() {
        let mut t = TradeTracker::default();
        t.on_rebalance(&wv(&[("A", 0.5), ("B", 0.5)]), |_| Some(100.0));
        let stats = t.finish();
        assert_eq!(stats.trades, 2);
        assert_eq!(stats.scored, 0);
        assert_eq!(stats.win_rate(), None);
    }

    #[test]
    fn long_gain_and_short_gain_both_win() {
        let mut t = TradeTracker::default();
        t.on_rebalance(&wv(&[("A", 0.5), ("B", -0.5)]), |_| Some(100.0));
        t.on_rebalance(&WeightVector::new(), |a| {
            Some(if a == "A" { 110.0 } else { 90.0 })
        });
        let stats = t.finish();
        assert_eq!(stats.trades, 4);
        assert_eq!(stats.scored, 2);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.win_rate(), Some(1.0));
    }

    #[test]
    fn unchanged_targets_are_not_trades() {
        let mut t = TradeTracker::default();
        let w = wv(&[("A", 1.0)]);
        t.on_rebalance(&w, |_| Some(100.0));
        t.on_rebalance(&w, |_| Some(80.0));
        assert_eq!(t.finish().trades, 1);
    }

    #[test]
    fn losing_resize_is_scored() {
        let mut t = TradeTracker::default();
        t.on_rebalance(&wv(&[("A", 1.0)]), |_| Some(100.0));
        t.on_rebalance(&wv(&[("A", 0.5)]), |_| Some(95.0));
        let stats = t.finish();
        assert_eq!(stats.scored, 1);
        assert_eq!(stats.wins, 0);
    }
}
