//! Drain - batch worker for hosted message queues.
//!
//! A single sequential worker that repeatedly long-polls a queue for a batch
//! of messages, hands each one to a [`MessageHandler`], and deletes it once
//! handled. Runs are bounded by wall-clock time, an optional iteration cap,
//! and a policy for how many empty polls to tolerate.
//!
//! # Core Concepts
//!
//! - **Queue**: The [`QueueClient`] trait abstracts the queue backend: queue
//!   info, long-poll reservations, delete and push. [`IronMqClient`] speaks
//!   the IronMQ v3 REST API.
//!
//! - **Handler**: The [`MessageHandler`] trait processes one message and
//!   reports a [`HandlerOutcome`]. [`SimulatedWork`] just sleeps.
//!
//! - **Config**: [`WorkerConfig`] holds the run limits and the
//!   [`QueueSettings`] credentials, loaded from a JSON file and the
//!   environment.
//!
//! - **Worker**: [`BatchWorker`] drives the poll / handle / delete loop and
//!   returns a [`RunSummary`] naming the [`StopReason`].
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use drain::*;
//!
//! let config = WorkerConfig::load(Some("config.json".as_ref()))?;
//! let queue = Arc::new(IronMqClient::new(&config.env, &config.queue_name)?);
//! let handler = Arc::new(SimulatedWork::new(config.msg_duration));
//!
//! let summary = BatchWorker::builder(config)
//!     .with_queue(queue)
//!     .with_handler(handler)
//!     .build()?
//!     .run()
//!     .await?;
//! ```

/// Command-line arguments for the `drain` binary.
pub mod cli;

/// Worker configuration and queue credentials.
///
/// The `config` module defines [`WorkerConfig`], [`QueueSettings`] and
/// [`EmptyResultPolicy`], plus the JSON file format in [`ConfigFile`].
pub mod config;

/// Error types for configuration, queue calls and the worker loop.
pub mod error;

/// Message handlers.
///
/// The `handler` module defines the [`MessageHandler`] trait, the
/// [`HandlerOutcome`] it reports, and the default [`SimulatedWork`] handler.
pub mod handler;

/// IronMQ v3 REST client.
pub mod ironmq;

/// Tracing subscriber setup for the binary.
pub mod logging;

#[cfg(feature = "metrics")]
/// Prometheus metrics.
///
/// The `metrics` module registers worker counters and histograms when the
/// `metrics` feature is enabled.
pub mod metrics;

/// Queue abstraction.
///
/// The `queue` module defines the [`QueueClient`] trait along with the
/// message and request types it works with:
/// - [`ReservedMessage`] - a message held under a reservation
/// - [`LongPollRequest`] - parameters for one long-poll
/// - [`QueueInfo`] - queue name and depth
/// - [`MessageId`] and [`ReservationId`] - identifiers
pub mod queue;

/// Poll failure handling.
///
/// The `retry` module provides [`PollFailurePolicy`] and
/// [`PollRetryConfig`] with exponential backoff between attempts.
pub mod retry;

/// Tracing spans and log events for the worker loop.
pub mod telemetry;

/// The batch worker loop.
///
/// The `worker` module provides:
/// - [`BatchWorker`] - the poll / handle / delete loop
/// - [`BatchWorkerBuilder`] - builder with explicit dependencies
/// - [`ShutdownToken`] - cooperative shutdown signalling
/// - [`RunState`] and [`RunSummary`] - per-run counters
/// - [`StopReason`] - why a run ended
pub mod worker;

pub use config::*;
pub use error::*;
pub use handler::*;
pub use ironmq::IronMqClient;
pub use queue::*;
pub use retry::*;
pub use worker::*;
