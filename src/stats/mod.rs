//! Signal performance counters.
//!
//! Counts are in-memory only and cover the current local day. At date
//! rollover the engine snapshots them into a [`DailyReport`] and starts
//! again from zero.

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyCounters {
    /// Signals armed today; compared against the daily cap.
    pub signals_today: u32,
    pub total_signals: u32,
    /// Wins. A single signal can win more than once.
    pub total_hits: u32,
    /// Signals that retired without a single win.
    pub total_misses: u32,
}

impl DailyCounters {
    /// Wins per signal sent, as a percentage. Zero before the first signal.
    pub fn hit_rate_pct(&self) -> f64 {
        if self.total_signals == 0 {
            return 0.0;
        }
        self.total_hits as f64 / self.total_signals as f64 * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot of one day's counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub counters: DailyCounters,
}

impl DailyReport {
    pub fn hit_rate_pct(&self) -> f64 {
        self.counters.hit_rate_pct()
    }
}
