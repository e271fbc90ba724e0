//! Test doubles for the drain worker loop.
//!
//! - [`ScriptedQueue`] - in-memory queue with scripted poll results
//! - [`RecordingHandler`] - handler that records what it handled

mod handler;
mod queue;

pub use handler::RecordingHandler;
pub use queue::{PollScript, ScriptedQueue};

use std::time::Duration;

use drain::{EmptyResultPolicy, QueueSettings, WorkerConfig};

/// Config against `test-queue` with no iteration sleep and no message
/// duration, stopping on the first empty poll.
pub fn test_config() -> WorkerConfig {
    WorkerConfig::new("test-queue", QueueSettings::new("test-project", "test-token"))
        .with_msg_duration(Duration::ZERO)
        .with_iteration_sleep(Duration::ZERO)
        .with_empty_result_policy(EmptyResultPolicy::StopAfter(0))
}
