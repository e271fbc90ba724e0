//! Prometheus metrics for the worker loop.
//!
//! Compiled only with the `metrics` feature.
//!
//! # Metrics
//!
//! ## Counters
//! - `drain_polls_total` - Long-polls that returned a result
//! - `drain_poll_failures_total` - Long-polls that returned an error
//! - `drain_messages_received_total` - Messages handed out by the queue
//! - `drain_messages_handled_total` - Messages handled, by `status`
//! - `drain_delete_failures_total` - Delete calls that failed
//!
//! ## Gauges
//! - `drain_queue_depth` - Queue depth observed at startup
//!
//! ## Histograms
//! - `drain_poll_latency_seconds` - Long-poll round trip
//! - `drain_message_duration_seconds` - Handler duration
#![cfg(feature = "metrics")]

use prometheus::{
    exponential_buckets, Counter, CounterVec, GaugeVec, Histogram, HistogramOpts, HistogramVec,
    Opts, Registry,
};
use std::sync::LazyLock;

/// Process-wide registry for drain metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static POLLS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    Counter::new("drain_polls_total", "Long-polls that returned a result")
        .expect("drain_polls_total metric creation failed")
});

pub static POLL_FAILURES_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    Counter::new("drain_poll_failures_total", "Long-polls that returned an error")
        .expect("drain_poll_failures_total metric creation failed")
});

pub static MESSAGES_RECEIVED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    Counter::new(
        "drain_messages_received_total",
        "Messages handed out by the queue",
    )
    .expect("drain_messages_received_total metric creation failed")
});

/// Labels:
/// - `status`: `success` or `failure`
pub static MESSAGES_HANDLED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new("drain_messages_handled_total", "Messages handled");
    CounterVec::new(opts, &["status"]).expect("drain_messages_handled_total metric creation failed")
});

pub static DELETE_FAILURES_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    Counter::new("drain_delete_failures_total", "Delete calls that failed")
        .expect("drain_delete_failures_total metric creation failed")
});

/// Labels:
/// - `queue`: queue name
pub static QUEUE_DEPTH: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new("drain_queue_depth", "Queue depth observed at startup");
    GaugeVec::new(opts, &["queue"]).expect("drain_queue_depth metric creation failed")
});

pub static POLL_LATENCY_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.005, 2.0, 14).expect("bucket creation failed");
    let opts = HistogramOpts::new("drain_poll_latency_seconds", "Long-poll round trip")
        .buckets(buckets);
    Histogram::with_opts(opts).expect("drain_poll_latency_seconds metric creation failed")
});

/// Labels:
/// - `status`: `success` or `failure`
pub static MESSAGE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.001, 2.0, 15).expect("bucket creation failed");
    let opts = HistogramOpts::new("drain_message_duration_seconds", "Handler duration")
        .buckets(buckets);
    HistogramVec::new(opts, &["status"])
        .expect("drain_message_duration_seconds metric creation failed")
});

/// Register every metric with [`REGISTRY`]. Safe to call more than once.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(POLLS_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(POLL_FAILURES_TOTAL.clone()),
        Box::new(MESSAGES_RECEIVED_TOTAL.clone()),
        Box::new(MESSAGES_HANDLED_TOTAL.clone()),
        Box::new(DELETE_FAILURES_TOTAL.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(POLL_LATENCY_SECONDS.clone()),
        Box::new(MESSAGE_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn set_queue_depth(queue: &str, depth: f64) {
    QUEUE_DEPTH.with_label_values(&[queue]).set(depth);
}

pub fn record_poll(received: usize, latency_secs: f64) {
    POLLS_TOTAL.inc();
    MESSAGES_RECEIVED_TOTAL.inc_by(received as f64);
    POLL_LATENCY_SECONDS.observe(latency_secs);
}

pub fn record_poll_failure() {
    POLL_FAILURES_TOTAL.inc();
}

pub fn record_message_handled(status: &str, duration_secs: f64) {
    MESSAGES_HANDLED_TOTAL.with_label_values(&[status]).inc();
    MESSAGE_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration_secs);
}

pub fn record_delete_failure() {
    DELETE_FAILURES_TOTAL.inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
