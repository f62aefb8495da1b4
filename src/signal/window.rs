use crate::config::StrategyConfig;
use chrono::{Duration, NaiveDateTime, Timelike};

/// A time interval during which a target outcome counts as a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryWindow {
    pub center: NaiveDateTime,
    pub tolerance: Duration,
}

impl EntryWindow {
    pub fn start(&self) -> NaiveDateTime {
        self.center - self.tolerance
    }

    pub fn end(&self) -> NaiveDateTime {
        self.center + self.tolerance
    }

    /// Inclusive on both ends.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start() <= t && t <= self.end()
    }
}

/// Drop seconds and sub-seconds.
pub fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t - Duration::seconds(t.second() as i64) - Duration::nanoseconds(t.nanosecond() as i64)
}

/// The three windows for a signal confirmed at `confirmed_at`.
pub fn entry_windows(confirmed_at: NaiveDateTime, strategy: &StrategyConfig) -> [EntryWindow; 3] {
    let t0 = truncate_to_minute(confirmed_at);
    let tolerance = Duration::minutes(strategy.tolerance_minutes);
    strategy.entry_offsets.map(|offset| EntryWindow {
        center: t0 + Duration::minutes(offset),
        tolerance,
    })
}
