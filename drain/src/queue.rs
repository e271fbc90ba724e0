use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Identifier the queue service assigns to a message.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token proving the caller currently holds a message's reservation.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub String);

impl Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message handed out by a long-poll and hidden from other consumers
/// until it is deleted or its reservation lapses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedMessage {
    /// Queue-assigned message id.
    pub id: MessageId,
    /// Raw message body.
    pub body: String,
    /// Reservation to present when deleting; absent when the queue
    /// deleted the message on receipt.
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
    /// How many times this message has been reserved, this time included.
    #[serde(default)]
    pub reserved_count: u32,
}

impl ReservedMessage {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(id),
            body: body.into(),
            reservation_id: None,
            reserved_count: 1,
        }
    }

    pub fn with_reservation(mut self, reservation_id: impl Into<String>) -> Self {
        self.reservation_id = Some(ReservationId(reservation_id.into()));
        self
    }
}

/// Queue metadata returned by [`QueueClient::info`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    /// Queue name as reported by the service.
    #[serde(default)]
    pub name: String,
    /// Approximate number of visible messages.
    #[serde(default)]
    pub size: u64,
}

/// Parameters of a single reserve call.
#[derive(Clone, Debug, PartialEq)]
pub struct LongPollRequest {
    /// Maximum number of messages to return.
    pub n: usize,
    /// How long each returned message stays reserved.
    pub reservation_timeout: Duration,
    /// Seconds to wait for at least one message before returning empty.
    pub wait_secs: u32,
    /// Delete messages as they are handed out instead of reserving them.
    pub delete_on_receive: bool,
}

impl LongPollRequest {
    /// Reservation timeout as whole seconds, rounded up so the window is
    /// never shorter than requested.
    pub fn reservation_timeout_secs(&self) -> u64 {
        let whole = self.reservation_timeout.as_secs();
        if self.reservation_timeout.subsec_nanos() > 0 {
            whole + 1
        } else {
            whole
        }
    }
}

/// Operations the worker loop needs from a hosted queue.
///
/// Implementations own transport, authentication and any retry policy of
/// their own; the worker only sequences these calls.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Fetch queue metadata, chiefly the current depth.
    async fn info(&self) -> Result<QueueInfo, QueueError>;

    /// Reserve up to `request.n` messages, waiting up to
    /// `request.wait_secs` for the first one.
    async fn long_poll(
        &self,
        request: LongPollRequest,
    ) -> Result<Vec<ReservedMessage>, QueueError>;

    /// Permanently remove a reserved message.
    async fn delete(&self, message: &ReservedMessage) -> Result<(), QueueError>;

    /// Append messages with the given bodies, returning their new ids.
    async fn push(&self, bodies: Vec<String>) -> Result<Vec<MessageId>, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_timeout_rounds_up() {
        let request = LongPollRequest {
            n: 1,
            reservation_timeout: Duration::from_secs_f64(1.1),
            wait_secs: 0,
            delete_on_receive: false,
        };
        assert_eq!(request.reservation_timeout_secs(), 2);
    }

    #[test]
    fn test_reservation_timeout_whole_seconds_unchanged() {
        let request = LongPollRequest {
            n: 10,
            reservation_timeout: Duration::from_secs(60),
            wait_secs: 5,
            delete_on_receive: false,
        };
        assert_eq!(request.reservation_timeout_secs(), 60);
    }

    #[test]
    fn test_reserved_message_builder() {
        let msg = ReservedMessage::new("42", "hello").with_reservation("r-1");
        assert_eq!(msg.id.as_str(), "42");
        assert_eq!(msg.body, "hello");
        assert_eq!(
            msg.reservation_id,
            Some(ReservationId("r-1".to_string()))
        );
        assert_eq!(msg.reserved_count, 1);
    }
}
