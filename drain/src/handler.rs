use std::time::Duration;

use async_trait::async_trait;

use crate::queue::ReservedMessage;

/// Result of handling one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The message was handled and can be deleted.
    Success,
    /// The handler rejected the message.
    Failure {
        /// Error message.
        error: Option<String>,
    },
}

impl HandlerOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        HandlerOutcome::Failure {
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HandlerOutcome::Success)
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerOutcome::Success => "success",
            HandlerOutcome::Failure { .. } => "failure",
        }
    }
}

/// The unit of real work performed for each reserved message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a message body. Must finish well inside the reservation
    /// window the worker requested for the batch.
    async fn handle(&self, message: &ReservedMessage) -> HandlerOutcome;
}

/// Stand-in handler that pauses for a fixed duration and always succeeds.
#[derive(Clone, Debug)]
pub struct SimulatedWork {
    duration: Duration,
}

impl SimulatedWork {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl MessageHandler for SimulatedWork {
    async fn handle(&self, _message: &ReservedMessage) -> HandlerOutcome {
        tokio::time::sleep(self.duration).await;
        HandlerOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_work_sleeps_for_duration() {
        let handler = SimulatedWork::new(Duration::from_secs(3));
        let message = ReservedMessage::new("1", "body");

        let start = tokio::time::Instant::now();
        let outcome = handler.handle(&message).await;

        assert_eq!(outcome, HandlerOutcome::Success);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(HandlerOutcome::Success.as_str(), "success");
        assert_eq!(HandlerOutcome::failure("bad").as_str(), "failure");
        assert!(!HandlerOutcome::failure("bad").is_success());
    }
}
