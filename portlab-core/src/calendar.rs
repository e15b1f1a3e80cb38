//! Trading calendar and rebalancing schedules.
//!
//! Sessions are derived once from the dataset's date axis. Schedules are
//! subsequences of those sessions: a weekly or monthly schedule picks the first
//! session on/after each period boundary, so it never lands on a date the
//! dataset does not contain.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data::PriceDataset;
use crate::error::ConfigError;

/// How often target weights are recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceFrequency {
    /// Every session.
    Daily,
    /// First session of each ISO week.
    Weekly,
    /// First session of each calendar month.
    Monthly,
    /// First session of each calendar quarter.
    Quarterly,
    /// Every `n` sessions counted from the anchor.
    EveryNSessions { n: usize },
}

impl RebalanceFrequency {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::EveryNSessions { n: 0 } => Err(ConfigError::ZeroSessionFrequency),
            _ => Ok(()),
        }
    }

    /// Period key for calendar-based frequencies. Sessions sharing a key
    /// belong to the same rebalancing period.
    fn period_key(&self, date: NaiveDate) -> Option<(i32, u32)> {
        match self {
            Self::Weekly => {
                let week = date.iso_week();
                Some((week.year(), week.week()))
            }
            Self::Monthly => Some((date.year(), date.month())),
            Self::Quarterly => Some((date.year(), (date.month() - 1) / 3)),
            Self::Daily | Self::EveryNSessions { .. } => None,
        }
    }
}

impl Default for RebalanceFrequency {
    fn default() -> Self {
        Self::Monthly
    }
}

/// Ordered, deduplicated sequence of valid session dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingCalendar {
    sessions: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// Sessions are exactly the dataset's dates.
    pub fn from_dataset(dataset: &PriceDataset) -> Self {
        Self {
            sessions: dataset.dates().to_vec(),
        }
    }

    /// Sort and deduplicate an arbitrary date list.
    pub fn from_dates(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort();
        dates.dedup();
        Self { sessions: dates }
    }

    pub fn sessions(&self) -> &[NaiveDate] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_valid(&self, date: NaiveDate) -> bool {
        self.sessions.binary_search(&date).is_ok()
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.sessions.binary_search(&date).ok()
    }

    /// First session strictly after `date`.
    pub fn next_session(&self, date: NaiveDate) -> Option<NaiveDate> {
        let idx = self.sessions.partition_point(|d| *d <= date);
        self.sessions.get(idx).copied()
    }

    /// First session on or after `date`.
    pub fn session_on_or_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        let idx = self.sessions.partition_point(|d| *d < date);
        self.sessions.get(idx).copied()
    }

    /// Per-session flags: `true` where the session is a rebalancing date.
    ///
    /// Sessions before `anchor` are never flagged. The first session on/after
    /// the anchor always is.
    pub fn rebalancing_mask(&self, frequency: RebalanceFrequency, anchor: NaiveDate) -> Vec<bool> {
        let start = self.sessions.partition_point(|d| *d < anchor);
        let mut mask = vec![false; self.sessions.len()];
        let mut last_key = None;

        for (i, &date) in self.sessions.iter().enumerate().skip(start) {
            let rebalance = match frequency {
                RebalanceFrequency::Daily => true,
                RebalanceFrequency::EveryNSessions { n } => n > 0 && (i - start) % n == 0,
                _ => {
                    let key = frequency.period_key(date);
                    let first_in_period = key != last_key;
                    last_key = key;
                    first_in_period
                }
            };
            mask[i] = rebalance;
        }
        mask
    }

    /// Rebalancing dates as an ordered subsequence of sessions.
    pub fn rebalancing_dates(
        &self,
        frequency: RebalanceFrequency,
        anchor: NaiveDate,
    ) -> Vec<NaiveDate> {
        self.rebalancing_mask(frequency, anchor)
            .into_iter()
            .zip(&self.sessions)
            .filter_map(|(flag, date)| flag.then_some(*date))
            .collect()
    }

    pub fn is_rebalancing_date(
        &self,
        date: NaiveDate,
        frequency: RebalanceFrequency,
        anchor: NaiveDate,
    ) -> bool {
        match self.position(date) {
            Some(idx) => self.rebalancing_mask(frequency, anchor)[idx],
            None => false,
        }
    }
}
