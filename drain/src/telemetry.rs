//! Tracing spans and event helpers for the worker loop.
//!
//! Every helper emits a `tracing` event and, with the `metrics` feature,
//! also updates the matching Prometheus series in [`crate::metrics`].
//!
//! ```ignore
//! use drain::telemetry::{poll_span, record_poll};
//!
//! let span = poll_span(0, 10);
//! let _enter = span.enter();
//! record_poll(0, 10, 3, latency, 20);
//! ```

use std::time::Duration;

use tracing::{info_span, Span};
use uuid::Uuid;

/// Span covering one whole worker run.
#[must_use]
pub fn run_span(run_id: Uuid, queue_name: impl AsRef<str>) -> Span {
    info_span!(
        "drain.run",
        run_id = %run_id,
        queue = %queue_name.as_ref(),
    )
}

/// Span covering one poll and the batch it returned.
#[must_use]
pub fn poll_span(iteration: u64, requested: usize) -> Span {
    info_span!("drain.poll", iteration = iteration, requested = requested)
}

/// Span covering the handling of a single message.
#[must_use]
pub fn message_span(index: usize, message_id: impl AsRef<str>) -> Span {
    info_span!(
        "drain.message",
        index = index,
        message_id = %message_id.as_ref(),
    )
}

/// Span covering a delete call.
#[must_use]
pub fn delete_span(message_id: impl AsRef<str>) -> Span {
    info_span!("drain.delete", message_id = %message_id.as_ref())
}

/// Record the queue depth observed at startup.
pub fn set_queue_depth(queue_name: impl AsRef<str>, depth: u64, latency: Duration) {
    tracing::info!(
        queue = %queue_name.as_ref(),
        depth = depth,
        latency = ?latency,
        "Queue has {} messages. (request took {:?})",
        depth,
        latency
    );

    #[cfg(feature = "metrics")]
    crate::metrics::set_queue_depth(queue_name.as_ref(), depth as f64);
}

/// Record a finished poll.
pub fn record_poll(
    iteration: u64,
    requested: usize,
    received: usize,
    latency: Duration,
    max_wait_secs: u32,
) {
    tracing::info!(
        requested = requested,
        received = received,
        latency = ?latency,
        "Iteration {}: Requested {}, got {} (request took {:?} with a max wait of {}s)",
        iteration,
        requested,
        received,
        latency,
        max_wait_secs
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_poll(received, latency.as_secs_f64());
}

/// Record a long-poll attempt that returned an error, retried or not.
pub fn record_poll_failed(attempt: u32, error: &dyn std::fmt::Display) {
    tracing::warn!(attempt = attempt, "long-poll failed: {error}");

    #[cfg(feature = "metrics")]
    crate::metrics::record_poll_failure();
}

/// Record the backoff before the next poll attempt.
pub fn record_poll_retry(attempt: u32, delay: Duration) {
    tracing::info!(attempt = attempt, delay = ?delay, "retrying long-poll in {:?}", delay);
}

/// Record the outcome of handling one message.
pub fn record_message_handled(
    index: usize,
    body: impl AsRef<str>,
    status: impl AsRef<str>,
    duration: Duration,
) {
    tracing::info!(
        status = %status.as_ref(),
        duration = ?duration,
        " {}: {:?}",
        index,
        body.as_ref()
    );

    #[cfg(feature = "metrics")]
    crate::metrics::record_message_handled(status.as_ref(), duration.as_secs_f64());
}

/// Record a delete call that failed.
pub fn record_delete_failed(body: impl AsRef<str>, error: &dyn std::fmt::Display) {
    tracing::warn!("Could not delete msg: {} {}", body.as_ref(), error);

    #[cfg(feature = "metrics")]
    crate::metrics::record_delete_failure();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_names() {
        // Spans are disabled without a subscriber; install one so metadata is set.
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(run_span(Uuid::now_v7(), "q").metadata().unwrap().name(), "drain.run");
            assert_eq!(poll_span(0, 1).metadata().unwrap().name(), "drain.poll");
            assert_eq!(message_span(0, "m").metadata().unwrap().name(), "drain.message");
            assert_eq!(delete_span("m").metadata().unwrap().name(), "drain.delete");
        });
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        set_queue_depth("q", 12, Duration::from_millis(30));
        record_poll(0, 10, 3, Duration::from_millis(5), 20);
        record_poll_failed(1, &"boom");
        record_poll_retry(1, Duration::from_secs(1));
        record_message_handled(0, "body", "success", Duration::from_secs(1));
        record_delete_failed("body", &"gone");
    }
}
