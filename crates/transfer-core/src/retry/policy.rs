//! Retry configuration and backoff decision, expanded from the teacher's
//! fixed `RetryPolicy` to the full option surface of §4.5/§6: an optional
//! attempt-count cap, an optional cumulative-duration cap (either may
//! override the other), a configurable initial delay and backoff
//! multiplier, and a toggle for retrying arbitrary 4xx statuses.

use std::time::Duration;

/// High-level classification of a failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Throttled,
    Connection,
    Http5xx(u16),
    /// Retryable only when `retry_all_errors` is set (e.g. a non-throttling 4xx).
    Http4xx(u16),
    /// Never retried (protocol violations, illegal arguments, pool exhaustion, ...).
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Full retry configuration per §4.5 / the `retry*` option table in §6.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub enabled: bool,
    /// If set, overrides `max_duration` as the stop condition.
    pub max_count: Option<u32>,
    pub max_duration: Duration,
    pub initial_delay: Duration,
    pub backoff: f64,
    pub retry_all_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            enabled: true,
            max_count: None,
            max_duration: Duration::from_secs(60),
            initial_delay: Duration::from_millis(100),
            backoff: 2.0,
            retry_all_errors: false,
        }
    }
}

impl RetryConfig {
    /// `attempt` is 0-indexed (0 = the attempt that just failed, about to
    /// retry for the first time). `elapsed` is the cumulative wall-clock
    /// time spent since the first attempt, not counting the upcoming delay.
    pub fn decide(&self, attempt: u32, elapsed: Duration, kind: ErrorKind) -> RetryDecision {
        if !self.enabled {
            return RetryDecision::NoRetry;
        }
        let retryable = match kind {
            ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::Throttled | ErrorKind::Http5xx(_) => true,
            ErrorKind::Http4xx(_) => self.retry_all_errors,
            ErrorKind::Fatal => false,
        };
        if !retryable {
            return RetryDecision::NoRetry;
        }

        if let Some(max_count) = self.max_count {
            if attempt + 1 >= max_count {
                return RetryDecision::NoRetry;
            }
        }

        let delay = self.delay_for_attempt(attempt);

        if self.max_count.is_none() && elapsed + delay > self.max_duration {
            return RetryDecision::NoRetry;
        }

        RetryDecision::RetryAfter(delay)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff.powi(attempt as i32).max(0.0);
        let nanos = (self.initial_delay.as_secs_f64() * factor * 1e9).min(u64::MAX as f64);
        Duration::from_nanos(nanos as u64)
    }
}
