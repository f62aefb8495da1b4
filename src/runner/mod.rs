//! Polling loop: fetch -> process -> notify, once per tick.
//!
//! Everything runs sequentially on one task and the loop owns all state.
//! A slow or retried fetch simply makes that tick longer. Shutdown is
//! signalled through a `watch` channel and checked between ticks, so an
//! in-flight request always finishes or times out on its own.

use crate::feed::OutcomeSource;
use crate::messages::{self, Link};
use crate::notify::Notifier;
use crate::signal::{SignalEngine, SignalEvent};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct Bot<S, N> {
    source: S,
    notifier: N,
    engine: SignalEngine,
    chat_id: String,
    link: Option<Link>,
    status_every: u64,
    ticks: u64,
    clock: fn() -> NaiveDateTime,
}

impl<S: OutcomeSource, N: Notifier> Bot<S, N> {
    pub fn new(source: S, notifier: N, engine: SignalEngine, chat_id: String) -> Self {
        Self {
            source,
            notifier,
            engine,
            chat_id,
            link: None,
            status_every: 60,
            ticks: 0,
            clock: local_now,
        }
    }

    pub fn with_link(mut self, link: Option<Link>) -> Self {
        self.link = link;
        self
    }

    /// Log a status line every `ticks` ticks; 0 disables it.
    pub fn with_status_every(mut self, ticks: u64) -> Self {
        self.status_every = ticks;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SignalEngine {
        &mut self.engine
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// One loop iteration.
    pub async fn tick(&mut self) -> Vec<SignalEvent> {
        self.roll_over((self.clock)().date()).await;

        let outcomes = self.source.poll().await;
        // Read the clock after the fetch; retries can take a while
        let now = (self.clock)();
        let events = self.observe(&outcomes, now).await;

        self.ticks += 1;
        if self.status_every > 0 && self.ticks % self.status_every == 0 {
            self.log_status(now);
        }
        events
    }

    /// Process one fetched sequence and deliver the resulting messages.
    pub async fn observe(&mut self, outcomes: &[i64], now: NaiveDateTime) -> Vec<SignalEvent> {
        if outcomes.is_empty() {
            return Vec::new();
        }
        let events = self.engine.process(outcomes, now);
        for event in &events {
            let text = messages::render(event, self.link.as_ref());
            self.deliver(&text).await;
        }
        events
    }

    /// Send the finished day's report when the date changes.
    pub async fn roll_over(&mut self, today: NaiveDate) -> bool {
        match self.engine.roll_day(today) {
            Some(report) => {
                info!(
                    date = %report.date,
                    signals = report.counters.total_signals,
                    hits = report.counters.total_hits,
                    misses = report.counters.total_misses,
                    "daily report"
                );
                self.deliver(&messages::daily_report(&report)).await;
                true
            }
            None => false,
        }
    }

    /// Final summary on shutdown, only when something was sent today.
    pub async fn shutdown(&mut self) {
        let summary = self.engine.summary();
        if summary.counters.total_signals > 0 {
            self.deliver(&messages::daily_report(&summary)).await;
        }
        info!(
            signals = summary.counters.total_signals,
            hits = summary.counters.total_hits,
            misses = summary.counters.total_misses,
            "bot stopped"
        );
    }

    async fn deliver(&self, text: &str) {
        // State already advanced; a lost message is not retried
        if let Err(e) = self.notifier.send(&self.chat_id, text).await {
            error!(error = %e, chat = %self.chat_id, "failed to deliver message");
        }
    }

    fn log_status(&self, now: NaiveDateTime) {
        let counters = self.engine.counters();
        let windows = self
            .engine
            .active()
            .map(|a| {
                a.windows
                    .iter()
                    .map(|w| w.center.format("%H:%M").to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let in_window = self.engine.active().map_or(false, |a| a.in_window(now));
        let (polls_ok, polls_failed) = self.source.poll_stats().unwrap_or_default();
        info!(
            time = %now.format("%H:%M:%S"),
            absences = self.engine.absences(),
            threshold = self.engine.strategy().min_absences,
            armed = self.engine.is_armed(),
            windows = ?windows,
            in_window,
            awaiting_repeat = self.engine.awaiting_repeat_target(),
            signals_today = counters.signals_today,
            hit_rate = %format!("{:.1}%", counters.hit_rate_pct()),
            polls_ok,
            polls_failed,
            "status"
        );
    }

    /// Tick until `shutdown` flips to true, sleeping `interval` between ticks.
    pub async fn run(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(chat = %self.chat_id, interval = ?interval, "polling started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    // Sender gone counts as a shutdown request
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("shutting down...");
        self.shutdown().await;
    }
}
