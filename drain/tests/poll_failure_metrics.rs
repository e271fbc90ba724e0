//! Prometheus counters driven through the worker loop.
#![cfg(feature = "metrics")]

use std::sync::Arc;
use std::time::Duration;

use drain::metrics::POLL_FAILURES_TOTAL;
use drain::{BatchWorker, PollFailurePolicy, PollRetryConfig, QueueError, WorkerError};
use drain_testkit::{test_config, RecordingHandler, ScriptedQueue};

fn unavailable() -> QueueError {
    QueueError::Status {
        status: 503,
        body: "service unavailable".to_string(),
    }
}

// One test so the process-wide counter is never shared between threads.
#[tokio::test(start_paused = true)]
async fn test_every_failed_poll_is_counted() {
    let queue = ScriptedQueue::new();
    queue.script_failure(unavailable());
    let before = POLL_FAILURES_TOTAL.get();

    let err = BatchWorker::new(
        test_config(),
        Arc::new(queue.clone()),
        Arc::new(RecordingHandler::new()),
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, WorkerError::Poll { attempts: 1, .. }));
    assert_eq!(POLL_FAILURES_TOTAL.get() - before, 1.0);

    let config = test_config().with_poll_failure(PollFailurePolicy::Retry(PollRetryConfig {
        max_attempts: 2,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(5),
    }));
    let queue = ScriptedQueue::new();
    queue.script_failure(unavailable());
    queue.script_failure(unavailable());
    let before = POLL_FAILURES_TOTAL.get();

    let err = BatchWorker::new(config, Arc::new(queue.clone()), Arc::new(RecordingHandler::new()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, WorkerError::Poll { attempts: 2, .. }));
    assert_eq!(POLL_FAILURES_TOTAL.get() - before, 2.0);
}
