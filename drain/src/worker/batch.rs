use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::handler::{HandlerOutcome, MessageHandler};
use crate::queue::{LongPollRequest, QueueClient, ReservedMessage};
use crate::telemetry;

use super::shutdown::ShutdownToken;
use super::state::{RunState, RunSummary, StopReason};

/// Sequential poll / handle / delete loop over one queue.
pub struct BatchWorker<Q, H>
where
    Q: QueueClient + 'static,
    H: MessageHandler + 'static,
{
    config: WorkerConfig,
    queue: Arc<Q>,
    error_queue: Option<Arc<Q>>,
    handler: Arc<H>,
    shutdown: ShutdownToken,
}

impl<Q, H> fmt::Debug for BatchWorker<Q, H>
where
    Q: QueueClient + 'static,
    H: MessageHandler + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWorker")
            .field("config", &self.config)
            .field("queue_type", &type_name::<Q>())
            .field("handler_type", &type_name::<H>())
            .field("error_queue_set", &self.error_queue.is_some())
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl<Q, H> BatchWorker<Q, H>
where
    Q: QueueClient + 'static,
    H: MessageHandler + 'static,
{
    /// Create a worker without an error queue.
    pub fn new(config: WorkerConfig, queue: Arc<Q>, handler: Arc<H>) -> Self {
        Self {
            config,
            queue,
            error_queue: None,
            handler,
            shutdown: ShutdownToken::new(),
        }
    }

    pub fn builder(config: WorkerConfig) -> BatchWorkerBuilder<Q, H> {
        BatchWorkerBuilder::new(config)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Token that stops this worker at its next boundary when cancelled.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Read the queue depth, then poll and handle batches until a stop
    /// condition is met.
    ///
    /// # Errors
    ///
    /// Fails when the queue info call fails or a poll keeps failing past
    /// the configured [`PollFailurePolicy`](crate::retry::PollFailurePolicy).
    /// Every other outcome is reported through [`RunSummary::stop_reason`].
    pub async fn run(&self) -> Result<RunSummary, WorkerError> {
        let state = RunState::new();
        let span = telemetry::run_span(state.run_id, &self.config.queue_name);
        self.drive(state).instrument(span).await
    }

    async fn drive(&self, mut state: RunState) -> Result<RunSummary, WorkerError> {
        let requested_at = Instant::now();
        let info = self.queue.info().await.map_err(WorkerError::QueueInfo)?;
        telemetry::set_queue_depth(&self.config.queue_name, info.size, requested_at.elapsed());

        let reason = self.poll_loop(&mut state).await?;
        let summary = state.finish(reason);

        tracing::info!(
            stop_reason = %summary.stop_reason,
            failed = summary.failed,
            dead_lettered = summary.dead_lettered,
            delete_failures = summary.delete_failures,
            "Worker ending after {:?} and processing {} messages",
            summary.elapsed,
            summary.processed
        );

        Ok(summary)
    }

    async fn poll_loop(&self, state: &mut RunState) -> Result<StopReason, WorkerError> {
        loop {
            if let Some(reason) = state.check_budget(&self.config) {
                return Ok(reason);
            }

            if state.iteration != 0 {
                tracing::info!("Sleeping {:?}", self.config.iteration_sleep);
                tokio::time::sleep(self.config.iteration_sleep).await;
            }

            if self.shutdown.is_cancelled() {
                return Ok(StopReason::Shutdown);
            }

            let iteration = state.iteration;
            state.iteration += 1;

            let span = telemetry::poll_span(iteration, self.config.batch_size);
            if let Some(reason) = self.run_iteration(iteration, state).instrument(span).await? {
                return Ok(reason);
            }
        }
    }

    async fn run_iteration(
        &self,
        iteration: u64,
        state: &mut RunState,
    ) -> Result<Option<StopReason>, WorkerError> {
        let request = LongPollRequest {
            n: self.config.batch_size,
            reservation_timeout: self.config.reservation_timeout(),
            wait_secs: self.config.dequeue_wait,
            delete_on_receive: false,
        };

        let requested_at = Instant::now();
        let messages = self.poll(request).await?;
        telemetry::record_poll(
            iteration,
            self.config.batch_size,
            messages.len(),
            requested_at.elapsed(),
            self.config.dequeue_wait,
        );

        if let Some(reason) = state.record_poll(messages.len(), self.config.empty_result_policy) {
            tracing::info!("Queue is empty - breaking work loop");
            return Ok(Some(reason));
        }

        for (index, message) in messages.iter().enumerate() {
            if !state.has_time_for_message(&self.config) {
                tracing::info!("Not enough time to process message - breaking work loop");
                return Ok(Some(StopReason::InsufficientTime));
            }
            if self.shutdown.is_cancelled() {
                return Ok(Some(StopReason::Shutdown));
            }

            let span = telemetry::message_span(index, message.id.as_str());
            self.process(index, message, state).instrument(span).await;
        }

        Ok(None)
    }

    async fn poll(&self, request: LongPollRequest) -> Result<Vec<ReservedMessage>, WorkerError> {
        let mut failed_attempts = 0u32;
        loop {
            match self.queue.long_poll(request.clone()).await {
                Ok(messages) => return Ok(messages),
                Err(err) => {
                    failed_attempts += 1;
                    telemetry::record_poll_failed(failed_attempts, &err);
                    match self.config.poll_failure.next_delay(failed_attempts) {
                        Some(delay) => {
                            telemetry::record_poll_retry(failed_attempts, delay);
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(WorkerError::Poll {
                                attempts: failed_attempts,
                                source: err,
                            })
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, index: usize, message: &ReservedMessage, state: &mut RunState) {
        let started = Instant::now();
        let outcome = self.handler.handle(message).await;
        telemetry::record_message_handled(index, &message.body, outcome.as_str(), started.elapsed());

        match outcome {
            HandlerOutcome::Success => {
                state.processed += 1;
                self.delete(message, state).await;
            }
            HandlerOutcome::Failure { error } => {
                state.failed += 1;
                let error = error.as_deref().unwrap_or("handler failed");
                self.reject(message, error, state).await;
            }
        }
    }

    async fn reject(&self, message: &ReservedMessage, error: &str, state: &mut RunState) {
        let Some(error_queue) = &self.error_queue else {
            tracing::warn!(
                message_id = %message.id,
                "handler rejected message, leaving it for redelivery: {error}"
            );
            return;
        };

        match error_queue.push(vec![message.body.clone()]).await {
            Ok(ids) => {
                state.dead_lettered += 1;
                tracing::warn!(
                    message_id = %message.id,
                    forwarded_as = ?ids,
                    "handler rejected message, forwarded to error queue: {error}"
                );
                self.delete(message, state).await;
            }
            Err(err) => {
                tracing::error!(
                    message_id = %message.id,
                    "could not forward rejected message to error queue, leaving it for redelivery: {err}"
                );
            }
        }
    }

    async fn delete(&self, message: &ReservedMessage, state: &mut RunState) {
        let result = self
            .queue
            .delete(message)
            .instrument(telemetry::delete_span(message.id.as_str()))
            .await;

        if let Err(err) = result {
            state.delete_failures += 1;
            telemetry::record_delete_failed(&message.body, &err);
        }
    }
}

/// Builder for a [`BatchWorker`] with explicit dependencies.
///
/// ```ignore
/// let worker = BatchWorker::builder(config)
///     .with_queue(queue)
///     .with_error_queue(error_queue)
///     .with_handler(handler)
///     .build()?;
/// ```
pub struct BatchWorkerBuilder<Q, H>
where
    Q: QueueClient + 'static,
    H: MessageHandler + 'static,
{
    config: WorkerConfig,
    queue: Option<Arc<Q>>,
    error_queue: Option<Arc<Q>>,
    handler: Option<Arc<H>>,
    shutdown: Option<ShutdownToken>,
}

impl<Q, H> fmt::Debug for BatchWorkerBuilder<Q, H>
where
    Q: QueueClient + 'static,
    H: MessageHandler + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWorkerBuilder")
            .field("config", &self.config)
            .field("queue_set", &self.queue.is_some())
            .field("error_queue_set", &self.error_queue.is_some())
            .field("handler_set", &self.handler.is_some())
            .field("shutdown_set", &self.shutdown.is_some())
            .finish()
    }
}

impl<Q, H> BatchWorkerBuilder<Q, H>
where
    Q: QueueClient + 'static,
    H: MessageHandler + 'static,
{
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            queue: None,
            error_queue: None,
            handler: None,
            shutdown: None,
        }
    }

    /// Set the queue to drain.
    pub fn with_queue(mut self, queue: Arc<Q>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Set the queue that receives rejected messages.
    pub fn with_error_queue(mut self, queue: Arc<Q>) -> Self {
        self.error_queue = Some(queue);
        self
    }

    /// Set the message handler.
    pub fn with_handler(mut self, handler: Arc<H>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Share an existing shutdown token instead of creating one.
    pub fn with_shutdown(mut self, shutdown: ShutdownToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Build the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue or handler is missing, or if the
    /// config names an error queue but no client for it was provided.
    pub fn build(self) -> anyhow::Result<BatchWorker<Q, H>> {
        let queue = self
            .queue
            .ok_or_else(|| anyhow::anyhow!("queue dependency missing"))?;
        let handler = self
            .handler
            .ok_or_else(|| anyhow::anyhow!("handler dependency missing"))?;

        if self.config.error_queue_name.is_some() && self.error_queue.is_none() {
            anyhow::bail!("errorQueueName is set but no error queue client was provided");
        }

        Ok(BatchWorker {
            config: self.config,
            queue,
            error_queue: self.error_queue,
            handler,
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}
