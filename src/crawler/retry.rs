//! Retry discipline for page and asset fetches
//!
//! Each URL is driven through the [`FetchAttempt`] state machine. Backoff
//! sleeps race the cancellation token so a cancelled crawl never waits out a
//! full backoff.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::FetchError;
use crate::state::FetchAttempt;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound for the backoff after an HTTP 429
const RATE_LIMIT_CEILING: Duration = Duration::from_secs(30);

/// Jitter is at most `1 / JITTER_DIVISOR` of the capped delay
const JITTER_DIVISOR: u64 = 10;

/// Retry limits and backoff shape
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    pub base: Duration,
    pub max: Duration,
    /// Minimum step after a 429, multiplied by the attempt number
    pub rate_limit_step: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            retries: config.retries,
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
            rate_limit_step: Duration::from_millis(config.rate_limit_backoff_ms),
            jitter: config.jitter,
        }
    }

    /// Total attempts a URL may receive
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Backoff after attempt number `attempt` (1-based) failed with `error`
    ///
    /// Ordinary failures wait `base * 2^(attempt - 1)` capped at `max`. A 429
    /// waits at least `rate_limit_step * attempt`, capped at 30 seconds.
    pub fn delay(&self, attempt: u32, error: &FetchError) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let base_ms = self.base.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;

        let exponential = base_ms.saturating_mul(2u64.saturating_pow(exponent));
        let mut capped = exponential.min(max_ms);

        if matches!(error, FetchError::RateLimited) {
            let step = (self.rate_limit_step.as_millis() as u64).saturating_mul(attempt as u64);
            capped = capped
                .max(step)
                .min(RATE_LIMIT_CEILING.as_millis() as u64);
        }

        let jitter = if self.jitter && capped > 0 {
            rand::thread_rng().gen_range(0..capped / JITTER_DIVISOR + 1)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// The outcome of a retried operation and how many attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub outcome: Result<T, FetchError>,
    pub attempts: u32,
}

/// Runs `op` until it succeeds, fails terminally, or the retry budget is spent
///
/// Cancellation is checked before every attempt and during every backoff
/// sleep; an in-flight attempt is never interrupted.
///
/// # Arguments
///
/// * `policy` - Retry limits and backoff shape
/// * `cancel` - Crawl-wide cancellation token
/// * `label` - URL or name used in log lines
/// * `op` - Produces one attempt per call
pub async fn fetch_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut state = FetchAttempt::Pending;

    loop {
        if cancel.is_cancelled() {
            return Attempted {
                attempts: state.abandon("cancelled".to_string()).attempts(),
                outcome: Err(FetchError::Cancelled),
            };
        }

        state = state.begin();
        let attempt = state.attempts();

        let error = match op().await {
            Ok(value) => {
                return Attempted {
                    attempts: state.succeed().attempts(),
                    outcome: Ok(value),
                };
            }
            Err(e) => e,
        };

        let delay = policy.delay(attempt, &error);
        state = state.fail(error.to_string(), error.is_retryable(), policy.retries, delay);

        match &state {
            FetchAttempt::RetryScheduled { delay, reason, .. } => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt,
                    policy.max_attempts(),
                    label,
                    reason,
                    delay
                );

                let delay = *delay;
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Backoff for {} interrupted by cancellation", label);
                        return Attempted {
                            attempts: state.abandon("cancelled".to_string()).attempts(),
                            outcome: Err(FetchError::Cancelled),
                        };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            _ => {
                tracing::debug!("Giving up on {} after {} attempt(s): {}", label, attempt, error);
                return Attempted {
                    attempts: state.attempts(),
                    outcome: Err(error),
                };
            }
        }
    }
}
