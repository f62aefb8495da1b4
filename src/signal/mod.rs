//! Branco signal state machine.
//!
//! Consumes each new outcome sequence from the feed and decides when to
//! arm a signal, whether a target outcome lands inside one of the three
//! entry windows (a win), and when the signal retires.
//!
//! Lifecycle:
//! - idle: waiting for the arming condition (leading absence run reaches
//!   `min_absences`, or the target itself when the threshold is <= 0)
//! - armed: three windows centred at `T0 + offset_i` minutes, with a hard
//!   expiry frozen at arm time
//! - after a win the engine waits for the *next* target outcome before it
//!   may arm again, even once the signal has retired
//!
//! All time comes in through `now`; the engine never reads the clock.

mod window;

pub use window::{entry_windows, truncate_to_minute, EntryWindow};

use crate::config::StrategyConfig;
use crate::stats::{DailyCounters, DailyReport};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

/// The roulette outcome the bot watches for (branco / white).
pub const TARGET_OUTCOME: i64 = 0;

/// Events for the notification layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    /// A new signal was confirmed.
    Armed {
        windows: [EntryWindow; 3],
        expires_at: NaiveDateTime,
    },
    /// The target landed inside an entry window.
    Win { at: NaiveDateTime },
    /// The last window closed. `had_hits == false` counts as a miss.
    Retired { had_hits: bool },
}

/// The signal currently in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSignal {
    pub armed_at: NaiveDateTime,
    pub windows: [EntryWindow; 3],
    /// Last window's centre plus tolerance, captured at arm time. Later
    /// strategy changes never move it.
    pub expires_at: NaiveDateTime,
    pub hits: u32,
}

impl ActiveSignal {
    fn arm(now: NaiveDateTime, strategy: &StrategyConfig) -> Self {
        let windows = entry_windows(now, strategy);
        let expires_at = windows[2].end();
        Self {
            armed_at: now,
            windows,
            expires_at,
            hits: 0,
        }
    }

    /// Inclusive on both window edges. Overlapping windows still count once.
    pub fn in_window(&self, now: NaiveDateTime) -> bool {
        self.windows.iter().any(|w| w.contains(now))
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now > self.expires_at
    }
}

/// Leading run of non-target outcomes. The whole length when no target is present.
pub fn count_absences(sequence: &[i64]) -> usize {
    sequence
        .iter()
        .take_while(|&&outcome| outcome != TARGET_OUTCOME)
        .count()
}

pub struct SignalEngine {
    strategy: StrategyConfig,
    active: Option<ActiveSignal>,
    /// Set by a win; cleared by the next target outcome.
    awaiting_repeat_target: bool,
    last_seen: Vec<i64>,
    absences: usize,
    counters: DailyCounters,
    day: NaiveDate,
}

impl SignalEngine {
    pub fn new(strategy: StrategyConfig, today: NaiveDate) -> Self {
        Self {
            strategy,
            active: None,
            awaiting_repeat_target: false,
            last_seen: Vec::new(),
            absences: 0,
            counters: DailyCounters::default(),
            day: today,
        }
    }

    /// Feed one polled sequence (most recent first) observed at `now`.
    pub fn process(&mut self, sequence: &[i64], now: NaiveDateTime) -> Vec<SignalEvent> {
        let mut events = Vec::new();

        // Feed hasn't moved since the last poll
        if sequence.is_empty() || sequence == self.last_seen.as_slice() {
            return events;
        }
        self.last_seen = sequence.to_vec();

        let head_is_target = sequence[0] == TARGET_OUTCOME;
        let mut won_now = false;

        if let Some(active) = self.active.as_mut() {
            if head_is_target {
                if active.in_window(now) {
                    active.hits += 1;
                    self.counters.total_hits += 1;
                    self.awaiting_repeat_target = true;
                    won_now = true;
                    info!(
                        at = %now.format("%H:%M:%S"),
                        hits = active.hits,
                        "WIN: target inside entry window"
                    );
                    events.push(SignalEvent::Win { at: now });
                } else {
                    info!(at = %now.format("%H:%M:%S"), "target outside entry windows");
                }
            }
        }

        if self.active.as_ref().map_or(false, |a| a.is_expired(now)) {
            if let Some(signal) = self.active.take() {
                events.push(self.retire(signal));
            }
        }

        self.absences = count_absences(sequence);

        // A win's own target doesn't release the cool-down; the next one does
        if self.awaiting_repeat_target && head_is_target && !won_now {
            self.awaiting_repeat_target = false;
            info!("next target after win observed, absence count starts over");
        }

        if self.active.is_none() && !self.awaiting_repeat_target && self.arming_condition(head_is_target) {
            if let Some(event) = self.arm(now) {
                events.push(event);
            }
        }

        debug!(
            absences = self.absences,
            threshold = self.strategy.min_absences,
            armed = self.active.is_some(),
            awaiting_repeat = self.awaiting_repeat_target,
            "sequence processed"
        );

        events
    }

    fn arming_condition(&self, head_is_target: bool) -> bool {
        if self.strategy.min_absences <= 0 {
            head_is_target
        } else {
            self.absences as i64 >= self.strategy.min_absences
        }
    }

    fn arm(&mut self, now: NaiveDateTime) -> Option<SignalEvent> {
        if self.counters.signals_today >= self.strategy.max_signals_per_day {
            warn!(
                sent = self.counters.signals_today,
                cap = self.strategy.max_signals_per_day,
                "daily signal cap reached, not arming"
            );
            return None;
        }

        let signal = ActiveSignal::arm(now, &self.strategy);
        self.counters.signals_today += 1;
        self.counters.total_signals += 1;

        info!(
            absences = self.absences,
            windows = ?signal.windows.iter().map(|w| w.center.format("%H:%M").to_string()).collect::<Vec<_>>(),
            expires_at = %signal.expires_at.format("%H:%M:%S"),
            "SIGNAL ARMED"
        );

        let event = SignalEvent::Armed {
            windows: signal.windows,
            expires_at: signal.expires_at,
        };
        self.active = Some(signal);
        Some(event)
    }

    fn retire(&mut self, signal: ActiveSignal) -> SignalEvent {
        let had_hits = signal.hits > 0;
        if had_hits {
            info!(hits = signal.hits, "signal retired after win, waiting for next target");
        } else {
            self.counters.total_misses += 1;
            self.awaiting_repeat_target = false;
            info!("signal retired without a win");
        }
        SignalEvent::Retired { had_hits }
    }

    /// Snapshot and reset the counters when the local date changes.
    ///
    /// A signal still in flight at midnight is counted in both days'
    /// `total_signals`, so its win or miss lands in a report that also
    /// counts the signal. It does not use up the new day's cap.
    pub fn roll_day(&mut self, today: NaiveDate) -> Option<DailyReport> {
        if today == self.day {
            return None;
        }
        let report = DailyReport {
            date: self.day,
            counters: self.counters,
        };
        self.counters.reset();
        if self.active.is_some() {
            self.counters.total_signals = 1;
        }
        self.day = today;
        info!(date = %today, "new day, counters reset");
        Some(report)
    }

    /// Counters so far today, as a report.
    pub fn summary(&self) -> DailyReport {
        DailyReport {
            date: self.day,
            counters: self.counters,
        }
    }

    /// Applies to the next signal; an armed one keeps its frozen windows.
    pub fn set_strategy(&mut self, strategy: StrategyConfig) {
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    pub fn active(&self) -> Option<&ActiveSignal> {
        self.active.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.active.is_some()
    }

    pub fn awaiting_repeat_target(&self) -> bool {
        self.awaiting_repeat_target
    }

    pub fn absences(&self) -> usize {
        self.absences
    }

    pub fn counters(&self) -> &DailyCounters {
        &self.counters
    }
}
