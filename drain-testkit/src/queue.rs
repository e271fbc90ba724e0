use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drain::{LongPollRequest, MessageId, QueueClient, QueueError, QueueInfo, ReservedMessage};
use parking_lot::Mutex;
use uuid::Uuid;

/// One scripted answer to a long-poll.
#[derive(Clone, Debug)]
pub enum PollScript {
    Batch(Vec<ReservedMessage>),
    Fail(QueueError),
}

/// In-memory [`QueueClient`] whose poll results are scripted up front.
///
/// Scripted answers are consumed first. Once they run out, polls draw up to
/// `n` messages from the backlog, and return empty when that is drained too.
/// Every call is recorded for later assertions.
#[derive(Clone)]
pub struct ScriptedQueue {
    inner: Arc<Mutex<ScriptState>>,
}

#[derive(Default)]
struct ScriptState {
    name: String,
    script: VecDeque<PollScript>,
    backlog: VecDeque<ReservedMessage>,
    poll_latency: Duration,
    info_size: Option<u64>,
    info_error: Option<QueueError>,
    push_error: Option<QueueError>,
    failing_deletes: HashSet<MessageId>,
    info_calls: usize,
    poll_requests: Vec<LongPollRequest>,
    deleted: Vec<ReservedMessage>,
    pushed: Vec<String>,
}

impl ScriptedQueue {
    pub fn new() -> Self {
        Self::named("test-queue")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptState {
                name: name.into(),
                ..Default::default()
            })),
        }
    }

    /// Queue with `count` backlog messages whose bodies are `msg-0`, `msg-1`, ...
    pub fn with_messages(count: usize) -> Self {
        let queue = Self::new();
        queue.enqueue((0..count).map(|i| format!("msg-{i}")));
        queue
    }

    /// Add bodies to the backlog served once the script is exhausted.
    pub fn enqueue<I, S>(&self, bodies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.inner.lock();
        for body in bodies {
            state.backlog.push_back(reserved(body.into()));
        }
    }

    /// Script the next poll to return these bodies.
    pub fn script_batch<I, S>(&self, bodies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let batch = bodies.into_iter().map(|body| reserved(body.into())).collect();
        self.inner.lock().script.push_back(PollScript::Batch(batch));
    }

    /// Script the next poll to return these exact messages.
    pub fn script_messages(&self, messages: Vec<ReservedMessage>) {
        self.inner.lock().script.push_back(PollScript::Batch(messages));
    }

    /// Script the next poll to come back empty.
    pub fn script_empty(&self) {
        self.inner.lock().script.push_back(PollScript::Batch(Vec::new()));
    }

    /// Script the next poll to fail.
    pub fn script_failure(&self, error: QueueError) {
        self.inner.lock().script.push_back(PollScript::Fail(error));
    }

    /// Virtual time each poll takes before answering.
    pub fn set_poll_latency(&self, latency: Duration) {
        self.inner.lock().poll_latency = latency;
    }

    /// Override the size reported by `info`. Defaults to the backlog length.
    pub fn set_info_size(&self, size: u64) {
        self.inner.lock().info_size = Some(size);
    }

    pub fn fail_info(&self, error: QueueError) {
        self.inner.lock().info_error = Some(error);
    }

    pub fn fail_pushes(&self, error: QueueError) {
        self.inner.lock().push_error = Some(error);
    }

    /// Make deletes of the message with `body` fail.
    pub fn fail_delete_of(&self, body: &str) {
        let mut state = self.inner.lock();
        let ids: Vec<MessageId> = state
            .script
            .iter()
            .filter_map(|script| match script {
                PollScript::Batch(batch) => Some(batch),
                PollScript::Fail(_) => None,
            })
            .flatten()
            .chain(state.backlog.iter())
            .filter(|message| message.body == body)
            .map(|message| message.id.clone())
            .collect();
        state.failing_deletes.extend(ids);
    }

    pub fn info_calls(&self) -> usize {
        self.inner.lock().info_calls
    }

    pub fn poll_requests(&self) -> Vec<LongPollRequest> {
        self.inner.lock().poll_requests.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.inner.lock().poll_requests.len()
    }

    pub fn deleted_bodies(&self) -> Vec<String> {
        self.inner
            .lock()
            .deleted
            .iter()
            .map(|message| message.body.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<ReservedMessage> {
        self.inner.lock().deleted.clone()
    }

    pub fn pushed_bodies(&self) -> Vec<String> {
        self.inner.lock().pushed.clone()
    }

    /// Backlog messages never handed out.
    pub fn remaining(&self) -> usize {
        self.inner.lock().backlog.len()
    }

    pub fn assert_poll_count_eq(&self, expected: usize) {
        let actual = self.poll_count();
        assert_eq!(actual, expected, "Expected {expected} polls, got {actual}");
    }
}

impl Default for ScriptedQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn reserved(body: String) -> ReservedMessage {
    ReservedMessage::new(Uuid::now_v7().to_string(), body)
        .with_reservation(Uuid::now_v7().to_string())
}

#[async_trait]
impl QueueClient for ScriptedQueue {
    async fn info(&self) -> Result<QueueInfo, QueueError> {
        let mut state = self.inner.lock();
        state.info_calls += 1;
        if let Some(error) = state.info_error.clone() {
            return Err(error);
        }

        Ok(QueueInfo {
            name: state.name.clone(),
            size: state.info_size.unwrap_or(state.backlog.len() as u64),
        })
    }

    async fn long_poll(
        &self,
        request: LongPollRequest,
    ) -> Result<Vec<ReservedMessage>, QueueError> {
        let latency = self.inner.lock().poll_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.inner.lock();
        let n = request.n;
        state.poll_requests.push(request);

        match state.script.pop_front() {
            Some(PollScript::Batch(batch)) => Ok(batch),
            Some(PollScript::Fail(error)) => Err(error),
            None => {
                let take = n.min(state.backlog.len());
                Ok(state.backlog.drain(..take).collect())
            }
        }
    }

    async fn delete(&self, message: &ReservedMessage) -> Result<(), QueueError> {
        let mut state = self.inner.lock();
        if state.failing_deletes.contains(&message.id) {
            return Err(QueueError::Status {
                status: 404,
                body: format!("{{\"msg\":\"Message not found: {}\"}}", message.id),
            });
        }
        state.deleted.push(message.clone());
        Ok(())
    }

    async fn push(&self, bodies: Vec<String>) -> Result<Vec<MessageId>, QueueError> {
        let mut state = self.inner.lock();
        if let Some(error) = state.push_error.clone() {
            return Err(error);
        }

        let ids = bodies
            .iter()
            .map(|_| MessageId::new(Uuid::now_v7().to_string()))
            .collect();
        state.pushed.extend(bodies);
        Ok(ids)
    }
}
