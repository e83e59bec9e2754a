//! Rate-limit backoff shared by every provider request
//!
//! A 429 answer is retried against the identical URL after a wait derived
//! from the provider's reset header. The number of retries and the total time
//! spent waiting are both bounded by [`RetryPolicy`].

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::http::{HttpClient, HttpResponse};
use std::sync::Arc;
use std::time::Duration;

/// Source of wall-clock time and sleeping
pub trait Clock: Send + Sync {
    /// Current time in Unix epoch seconds
    fn now_unix(&self) -> i64;

    fn sleep(&self, duration: Duration);
}

/// Real clock: `chrono` for time, blocking thread sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How a provider signals rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub status: u16,
    /// Header carrying the reset instant in epoch seconds
    pub reset_header: &'static str,
}

impl RateLimitSignal {
    pub const GITHUB: RateLimitSignal = RateLimitSignal {
        status: 429,
        reset_header: "X-RateLimit-Reset",
    };

    pub const GITLAB: RateLimitSignal = RateLimitSignal {
        status: 429,
        reset_header: "RateLimit-Reset",
    };

    pub fn matches(&self, response: &HttpResponse) -> bool {
        response.status == self.status
    }
}

/// Reset information read from one rate-limited response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitState {
    ResetAt(i64),
    Unknown,
}

impl RateLimitState {
    pub fn from_response(response: &HttpResponse, signal: &RateLimitSignal) -> Self {
        response
            .header(signal.reset_header)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(RateLimitState::ResetAt)
            .unwrap_or(RateLimitState::Unknown)
    }
}

/// Bounds and timings for rate-limit retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first request
    pub max_attempts: u32,
    /// Wait used when the reset header is missing or unparsable
    pub fallback_wait: Duration,
    /// Added to a known reset instant
    pub reset_margin: Duration,
    /// Upper bound on the sum of all waits for one request
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            fallback_wait: Duration::from_secs(60),
            reset_margin: Duration::from_secs(5),
            max_total_wait: Duration::from_secs(3600),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            fallback_wait: Duration::from_secs(config.fallback_wait_secs),
            reset_margin: Duration::from_secs(config.reset_margin_secs),
            max_total_wait: Duration::from_secs(config.max_total_wait_secs),
        }
    }
}

impl RetryPolicy {
    /// Time to wait before retrying
    ///
    /// A reset instant that has already passed retries immediately.
    pub fn wait_for(&self, state: RateLimitState, now_unix: i64) -> Duration {
        match state {
            RateLimitState::ResetAt(reset) => {
                let remaining = reset - now_unix;
                if remaining > 0 {
                    Duration::from_secs(remaining as u64) + self.reset_margin
                } else {
                    Duration::ZERO
                }
            }
            RateLimitState::Unknown => self.fallback_wait,
        }
    }
}

/// [`HttpClient`] wrapper that waits out rate limiting
#[derive(Clone)]
pub struct RateLimitedClient {
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    signal: RateLimitSignal,
}

impl RateLimitedClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        signal: RateLimitSignal,
    ) -> Self {
        Self {
            http,
            clock,
            policy,
            signal,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Issue `GET url`, retrying the same request while it is rate limited
    ///
    /// Returns the first response that is not a rate-limit answer, whatever
    /// its status. Fails with [`FetchError::RateLimitExhausted`] once the
    /// retry count or the total wait would exceed the policy.
    pub fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        let mut retries = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            let response = self.http.get(url, headers)?;
            if !self.signal.matches(&response) {
                return Ok(response);
            }

            let state = RateLimitState::from_response(&response, &self.signal);
            let wait = self.policy.wait_for(state, self.clock.now_unix());

            if retries >= self.policy.max_attempts || waited + wait > self.policy.max_total_wait {
                tracing::error!(
                    "Rate limit not lifted after {} retries ({}s waited): {}",
                    retries,
                    waited.as_secs(),
                    url
                );
                return Err(FetchError::RateLimitExhausted {
                    url: url.to_string(),
                    attempts: retries,
                    waited_secs: waited.as_secs(),
                });
            }

            match state {
                RateLimitState::ResetAt(reset) => tracing::warn!(
                    "Rate limit exceeded, reset at {}; sleeping {}s",
                    chrono::DateTime::from_timestamp(reset, 0)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| reset.to_string()),
                    wait.as_secs()
                ),
                RateLimitState::Unknown => tracing::warn!(
                    "Rate limit exceeded without a usable {} header; sleeping {}s",
                    self.signal.reset_header,
                    wait.as_secs()
                ),
            }

            if !wait.is_zero() {
                self.clock.sleep(wait);
            }
            waited += wait;
            retries += 1;
        }
    }
}
