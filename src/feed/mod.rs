//! Recent-results feed fetcher.
//!
//! Polls the roulette "recent games" endpoint, which returns a JSON array
//! of game records, most recent first. Only the integer `roll` of each
//! record is kept.
//!
//! Transport errors and non-2xx statuses are retried with a doubling
//! backoff (1s, 2s, 4s, ...). A payload that does not decode is not
//! retried. Callers of [`FeedFetcher::fetch`] never see an error: any
//! failure comes back as an empty sequence, meaning "no data this tick".

use crate::config::FeedConfig;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const BACKOFF_BASE: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(u16),
    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Decode failures are permanent for this tick; everything else may
    /// succeed on the next attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Decode(_))
    }
}

// --- Wire types ---

#[derive(Deserialize)]
struct GameRecord {
    roll: i64,
}

/// Decode a feed body into outcomes, most recent first.
pub fn parse_outcomes(body: &str) -> Result<Vec<i64>, serde_json::Error> {
    let records: Vec<GameRecord> = serde_json::from_str(body)?;
    Ok(records.into_iter().map(|r| r.roll).collect())
}

/// Sleep before retry number `attempt` (1-based): base, 2x base, 4x base, ...
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Anything that can hand the runner the latest outcome sequence.
pub trait OutcomeSource: Send {
    /// Latest outcomes, most recent first. Empty means "skip this tick".
    fn poll(&mut self) -> BoxFuture<'_, Vec<i64>>;

    /// (successful polls, failed polls), when the source tracks them.
    fn poll_stats(&self) -> Option<(u64, u64)> {
        None
    }
}

pub struct FeedFetcher {
    client: reqwest::Client,
    url: String,
    retry_attempts: u32,
    backoff_base: Duration,
    successes: u64,
    failures: u64,
}

impl FeedFetcher {
    pub fn new(config: &FeedConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            retry_attempts: config.retry_attempts.max(1),
            backoff_base: BACKOFF_BASE,
            successes: 0,
            failures: 0,
        })
    }

    /// Override the first backoff step.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Polls that produced data.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Polls that gave up (retries exhausted or bad payload).
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Single request, no retries.
    pub async fn try_fetch(&self) -> Result<Vec<i64>, FetchError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        Ok(parse_outcomes(&body)?)
    }

    /// Fetch with bounded retries. Never fails; returns an empty vec instead.
    pub async fn fetch(&mut self) -> Vec<i64> {
        let attempts = self.retry_attempts;

        for attempt in 1..=attempts {
            match self.try_fetch().await {
                Ok(outcomes) => {
                    self.successes += 1;
                    debug!(count = outcomes.len(), head = ?outcomes.first(), "feed polled");
                    return outcomes;
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, attempts, error = %e, "feed request failed");
                    if attempt < attempts {
                        tokio::time::sleep(backoff_delay(attempt, self.backoff_base)).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "feed payload rejected, not retrying");
                    break;
                }
            }
        }

        self.failures += 1;
        Vec::new()
    }
}

impl OutcomeSource for FeedFetcher {
    fn poll(&mut self) -> BoxFuture<'_, Vec<i64>> {
        self.fetch().boxed()
    }

    fn poll_stats(&self) -> Option<(u64, u64)> {
        Some((self.successes, self.failures))
    }
}
