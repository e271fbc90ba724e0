use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{EmptyResultPolicy, WorkerConfig};

/// Why a run ended without a fatal error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The wall-clock budget was spent before the next iteration.
    MaxDuration,
    /// The iteration cap was reached.
    MaxIterations,
    /// The empty-result policy gave up on the queue.
    QueueEmpty,
    /// Too little time was left to start the next message.
    InsufficientTime,
    /// Shutdown was requested.
    Shutdown,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxDuration => "max_duration",
            StopReason::MaxIterations => "max_iterations",
            StopReason::QueueEmpty => "queue_empty",
            StopReason::InsufficientTime => "insufficient_time",
            StopReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and clocks for a single call to
/// [`BatchWorker::run`](super::BatchWorker::run).
#[derive(Clone, Debug)]
pub struct RunState {
    pub run_id: Uuid,
    started: Instant,
    started_at: DateTime<Utc>,
    /// Index of the current iteration; equals the number of polls started.
    pub iteration: u64,
    /// Empty polls in a row.
    pub consecutive_empty: u32,
    /// Messages the handler accepted.
    pub processed: u64,
    /// Messages the handler rejected.
    pub failed: u64,
    /// Rejected messages forwarded to the error queue.
    pub dead_lettered: u64,
    /// Delete calls that returned an error.
    pub delete_failures: u64,
}

impl RunState {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// State whose clock started at `started`.
    pub fn started_at(started: Instant) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started,
            started_at: Utc::now(),
            iteration: 0,
            consecutive_empty: 0,
            processed: 0,
            failed: 0,
            dead_lettered: 0,
            delete_failures: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget checks made at the top of every iteration, in order:
    /// duration, then iteration cap.
    pub fn check_budget(&self, config: &WorkerConfig) -> Option<StopReason> {
        if self.elapsed() > config.max_duration {
            return Some(StopReason::MaxDuration);
        }
        if let Some(max) = config.max_iterations {
            if self.iteration >= max {
                return Some(StopReason::MaxIterations);
            }
        }
        None
    }

    /// Update the empty-poll counter after a poll that returned `received`
    /// messages.
    pub fn record_poll(&mut self, received: usize, policy: EmptyResultPolicy) -> Option<StopReason> {
        if received > 0 {
            self.consecutive_empty = 0;
            return None;
        }

        self.consecutive_empty = self.consecutive_empty.saturating_add(1);
        if policy.should_stop(self.consecutive_empty) {
            Some(StopReason::QueueEmpty)
        } else {
            None
        }
    }

    /// Whether another message may still be started.
    pub fn has_time_for_message(&self, config: &WorkerConfig) -> bool {
        self.elapsed() <= config.message_deadline()
    }

    pub fn finish(self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            stop_reason,
            iterations: self.iteration,
            processed: self.processed,
            failed: self.failed,
            dead_lettered: self.dead_lettered,
            delete_failures: self.delete_failures,
            elapsed: self.started.elapsed(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// What a finished run did.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub stop_reason: StopReason,
    /// Polls started.
    pub iterations: u64,
    pub processed: u64,
    pub failed: u64,
    pub dead_lettered: u64,
    pub delete_failures: u64,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
