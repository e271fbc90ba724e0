use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use drain::{HandlerOutcome, MessageHandler, ReservedMessage};
use parking_lot::Mutex;

/// [`MessageHandler`] that records every body it sees.
///
/// Succeeds unless the body was marked with [`RecordingHandler::fail_on`].
/// An optional per-message duration advances virtual time under
/// `start_paused` tests.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    handled: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    duration: Duration,
    on_handle: Option<Arc<dyn Fn(&ReservedMessage) + Send + Sync>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// Run `hook` after each message is handled.
    pub fn on_handle<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReservedMessage) + Send + Sync + 'static,
    {
        self.on_handle = Some(Arc::new(hook));
        self
    }

    /// Reject messages with this body.
    pub fn fail_on(&self, body: impl Into<String>) {
        self.failing.lock().insert(body.into());
    }

    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().clone()
    }

    pub fn handled_count(&self) -> usize {
        self.handled.lock().len()
    }

    pub fn assert_handled_count_eq(&self, expected: usize) {
        let actual = self.handled_count();
        assert_eq!(
            actual, expected,
            "Expected {expected} handled messages, got {actual}"
        );
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: &ReservedMessage) -> HandlerOutcome {
        if !self.duration.is_zero() {
            tokio::time::sleep(self.duration).await;
        }

        self.handled.lock().push(message.body.clone());
        if let Some(hook) = &self.on_handle {
            hook(message);
        }

        if self.failing.lock().contains(&message.body) {
            HandlerOutcome::failure(format!("rejected {}", message.body))
        } else {
            HandlerOutcome::Success
        }
    }
}
