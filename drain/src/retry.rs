use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_serde;

/// Backoff settings for retrying a failed long-poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollRetryConfig {
    /// Total attempts per poll, the first one included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(with = "duration_serde")]
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    #[serde(with = "duration_serde")]
    pub max_delay: Duration,
}

impl Default for PollRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// What the worker does when a long-poll returns an error.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PollFailurePolicy {
    /// Give up on the first failure.
    #[default]
    Abort,
    /// Retry with exponential backoff, then give up.
    Retry(PollRetryConfig),
}

impl PollFailurePolicy {
    /// Total attempts allowed for one poll.
    pub fn max_attempts(&self) -> u32 {
        match self {
            PollFailurePolicy::Abort => 1,
            PollFailurePolicy::Retry(config) => config.max_attempts.max(1),
        }
    }

    /// Delay to wait after `failed_attempts` consecutive failures, or
    /// `None` when no further attempt is allowed.
    pub fn next_delay(&self, failed_attempts: u32) -> Option<Duration> {
        match self {
            PollFailurePolicy::Abort => None,
            PollFailurePolicy::Retry(config) => {
                if should_give_up(failed_attempts, self.max_attempts()) {
                    None
                } else {
                    Some(compute_poll_backoff(failed_attempts, config))
                }
            }
        }
    }
}

/// Exponential backoff: `min(base_delay * 2^(failed_attempts - 1), max_delay)`.
pub fn compute_poll_backoff(failed_attempts: u32, config: &PollRetryConfig) -> Duration {
    if failed_attempts == 0 {
        return Duration::ZERO;
    }

    let exp = failed_attempts.saturating_sub(1).min(31) as i32;
    let scaled = config.base_delay.as_secs_f64() * 2f64.powi(exp);
    let capped = scaled.min(config.max_delay.as_secs_f64()).max(0.0);

    Duration::from_secs_f64(capped)
}

/// True once `failed_attempts` has used up the attempt budget.
pub fn should_give_up(failed_attempts: u32, max_attempts: u32) -> bool {
    failed_attempts >= max_attempts
}
