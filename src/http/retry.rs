//! Retry policy and the per-attempt failure taxonomy.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

/// Default number of attempts for one logical fetch.
pub const MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff base: attempt `k` waits `base^k` units.
pub const RATE_LIMIT_BASE: u32 = 2;

/// Length of one backoff unit.
pub const BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// Attempt budget and backoff formula for the fetch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: u32,
    pub unit: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: RATE_LIMIT_BASE,
            unit: BACKOFF_UNIT,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy with the given attempt budget (at least 1).
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Wait before retrying after the given zero-based attempt: `unit * base^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(self.base.saturating_pow(attempt))
    }
}

/// Why a single attempt did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection reset, timeout, DNS failure and similar transport errors.
    TransientNetwork(String),
    /// HTTP 429.
    RateLimited(Duration),
    /// HTTP 500/502/503/504.
    ServerFault(StatusCode, Duration),
    /// HTTP 404.
    NotFound,
    /// Any status missing from the policy table.
    UnclassifiedStatus(StatusCode),
    /// The body of a successful response could not be read as declared.
    BodyDecode(String),
}

impl FetchError {
    /// Delay before the next attempt, or `None` when the loop moves on immediately.
    pub fn retry_delay(&self, policy: &RetryPolicy, attempt: u32) -> Option<Duration> {
        match self {
            FetchError::RateLimited(wait) | FetchError::ServerFault(_, wait) => Some(*wait),
            FetchError::TransientNetwork(_) | FetchError::BodyDecode(_) => {
                Some(policy.backoff(attempt))
            }
            FetchError::NotFound | FetchError::UnclassifiedStatus(_) => None,
        }
    }

    /// True for failures that no amount of waiting is expected to fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound | FetchError::UnclassifiedStatus(_)
        )
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::TransientNetwork(msg) => write!(f, "network error: {}", msg),
            FetchError::RateLimited(_) => write!(f, "rate limited"),
            FetchError::ServerFault(status, _) => {
                write!(f, "server error (HTTP {})", status.as_u16())
            }
            FetchError::NotFound => write!(f, "not found"),
            FetchError::UnclassifiedStatus(status) => {
                write!(f, "unexpected status HTTP {}", status.as_u16())
            }
            FetchError::BodyDecode(msg) => write!(f, "failed to read response body: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// One failed attempt, kept for the summary logged when the budget runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub attempt: u32,
    pub error: FetchError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {}", self.attempt + 1, self.error)
    }
}

/// Joins attempt failures into a single line for the exhaustion record.
pub fn summarize(failures: &[AttemptFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
