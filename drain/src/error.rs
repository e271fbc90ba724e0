use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling a [`WorkerConfig`](crate::config::WorkerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config document is not valid JSON for the worker.
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Queue project id or token is empty after loading.
    #[error("Require queue project & token set in code config.")]
    MissingCredentials,

    /// Some field or field combination is rejected.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// Errors returned by a [`QueueClient`](crate::queue::QueueClient).
#[derive(Clone, Debug, Error)]
pub enum QueueError {
    /// The request never produced a response.
    #[error("queue transport error: {0}")]
    Transport(String),

    /// The queue service answered with a non-success status.
    #[error("queue returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("could not decode queue response: {0}")]
    Decode(String),

    /// Anything else a backend wants to surface.
    #[error("{0}")]
    Other(String),
}

impl QueueError {
    pub fn other(msg: impl Into<String>) -> Self {
        QueueError::Other(msg.into())
    }
}

impl From<reqwest::Error> for QueueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            QueueError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            QueueError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            QueueError::Transport(err.to_string())
        }
    }
}

/// Fatal outcomes of [`BatchWorker::run`](crate::worker::BatchWorker::run).
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Queue depth could not be read before the first poll.
    #[error("Could not access queue info: {0}")]
    QueueInfo(#[source] QueueError),

    /// Long-poll kept failing after the configured number of attempts.
    #[error("long-poll failed after {attempts} attempt(s): {source}")]
    Poll {
        attempts: u32,
        #[source]
        source: QueueError,
    },
}
