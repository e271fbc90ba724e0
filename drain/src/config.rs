use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::retry::{PollFailurePolicy, PollRetryConfig};

/// Default queue API host when neither the config nor `IRON_HOST` names one.
pub const DEFAULT_HOST: &str = "mq-aws-us-east-1-1.iron.io";
/// Default URL scheme for the queue API.
pub const DEFAULT_SCHEME: &str = "https";
/// Default port for the queue API.
pub const DEFAULT_PORT: u16 = 443;
/// Queue API version the HTTP client speaks.
pub const DEFAULT_API_VERSION: &str = "3";

/// Safety margin applied to the worst-case batch duration when reserving.
pub const RESERVATION_MARGIN: f64 = 1.1;

/// When an empty poll ends the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmptyResultPolicy {
    /// Stop once more than `n` consecutive polls come back empty.
    StopAfter(u32),
    /// Keep polling on empty results; only the time and iteration budgets
    /// end the run.
    NeverStop,
}

impl EmptyResultPolicy {
    /// Policy for the boolean keep-alive switch.
    pub fn from_keep_alive(keep_alive: bool) -> Self {
        if keep_alive {
            EmptyResultPolicy::NeverStop
        } else {
            EmptyResultPolicy::StopAfter(0)
        }
    }

    /// Whether `consecutive_empty` empty polls in a row end the run.
    pub fn should_stop(&self, consecutive_empty: u32) -> bool {
        match self {
            EmptyResultPolicy::StopAfter(threshold) => consecutive_empty > *threshold,
            EmptyResultPolicy::NeverStop => false,
        }
    }
}

impl Default for EmptyResultPolicy {
    fn default() -> Self {
        EmptyResultPolicy::StopAfter(0)
    }
}

/// Connection settings for the hosted queue.
///
/// Keys are snake_case to match the provider's own config files. Keys this
/// crate does not know about are kept in `extra` and printed back as-is.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for QueueSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSettings")
            .field("token", &mask_token(&self.token))
            .field("project_id", &self.project_id)
            .field("host", &self.host)
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .field("api_version", &self.api_version)
            .field("user_agent", &self.user_agent)
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl QueueSettings {
    pub fn new(project_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn scheme(&self) -> &str {
        self.scheme.as_deref().unwrap_or(DEFAULT_SCHEME)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION)
    }

    /// Fill whatever the config file left unset from `IRON_*` variables.
    ///
    /// Values already present in the file win.
    pub fn fill_from_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if self.project_id.is_empty() {
            if let Some(project_id) = lookup("IRON_PROJECT_ID") {
                self.project_id = project_id;
            }
        }
        if self.token.is_empty() {
            if let Some(token) = lookup("IRON_TOKEN") {
                self.token = token;
            }
        }
        if self.host.is_none() {
            self.host = lookup("IRON_HOST");
        }
        if self.scheme.is_none() {
            self.scheme = lookup("IRON_SCHEME");
        }
        if self.port.is_none() {
            if let Some(raw) = lookup("IRON_PORT") {
                match raw.parse() {
                    Ok(port) => self.port = Some(port),
                    Err(_) => tracing::warn!(value = %raw, "ignoring unparseable IRON_PORT"),
                }
            }
        }
        if self.api_version.is_none() {
            self.api_version = lookup("IRON_API_VERSION");
        }
    }

    /// Copy of these settings with the token masked for display.
    pub fn masked(&self) -> Self {
        Self {
            token: mask_token(&self.token),
            ..self.clone()
        }
    }
}

/// Effective worker configuration, fixed for the life of the process.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerConfig {
    /// Simulated work per message.
    pub msg_duration: Duration,
    /// Pause between polls.
    pub iteration_sleep: Duration,
    /// Wall-clock budget for the whole run.
    pub max_duration: Duration,
    /// Cap on polling iterations, unbounded when `None`.
    pub max_iterations: Option<u64>,
    /// Messages requested per poll.
    pub batch_size: usize,
    /// Long-poll wait in seconds.
    pub dequeue_wait: u32,
    /// When empty polls end the run.
    pub empty_result_policy: EmptyResultPolicy,
    /// What a failed poll does to the run.
    pub poll_failure: PollFailurePolicy,
    /// Queue that receives bodies the handler rejected.
    pub error_queue_name: Option<String>,
    /// Queue to drain.
    pub queue_name: String,
    /// Queue connection settings and credentials.
    pub env: QueueSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            msg_duration: Duration::from_secs(1),
            iteration_sleep: Duration::from_millis(20),
            max_duration: Duration::from_secs(45 * 60),
            max_iterations: None,
            batch_size: 1,
            dequeue_wait: 0,
            empty_result_policy: EmptyResultPolicy::StopAfter(0),
            poll_failure: PollFailurePolicy::Abort,
            error_queue_name: None,
            queue_name: String::new(),
            env: QueueSettings::default(),
        }
    }
}

impl WorkerConfig {
    /// Create a configuration with defaults for the given queue.
    pub fn new(queue_name: impl Into<String>, env: QueueSettings) -> Self {
        Self {
            queue_name: queue_name.into(),
            env,
            ..Default::default()
        }
    }

    pub fn with_msg_duration(mut self, duration: Duration) -> Self {
        self.msg_duration = duration;
        self
    }

    pub fn with_iteration_sleep(mut self, duration: Duration) -> Self {
        self.iteration_sleep = duration;
        self
    }

    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = duration;
        self
    }

    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_dequeue_wait(mut self, seconds: u32) -> Self {
        self.dequeue_wait = seconds;
        self
    }

    pub fn with_empty_result_policy(mut self, policy: EmptyResultPolicy) -> Self {
        self.empty_result_policy = policy;
        self
    }

    pub fn with_poll_failure(mut self, policy: PollFailurePolicy) -> Self {
        self.poll_failure = policy;
        self
    }

    pub fn with_error_queue(mut self, queue_name: impl Into<String>) -> Self {
        self.error_queue_name = Some(queue_name.into());
        self
    }

    /// Load from an optional JSON file over the defaults, fill credentials
    /// from the process environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`WorkerConfig::load`] with an explicit environment lookup.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json_str(&raw)?
            }
            None => Self::default(),
        };

        config.env.fill_from_env(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document and lay it over the defaults. Does not
    /// validate.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(raw)?;
        Self::default().overlay(file)
    }

    /// Apply every field present in `file`.
    pub fn overlay(mut self, file: ConfigFile) -> Result<Self, ConfigError> {
        if let Some(duration) = file.msg_duration {
            self.msg_duration = duration;
        }
        if let Some(duration) = file.iteration_sleep {
            self.iteration_sleep = duration;
        }
        if let Some(duration) = file.max_duration {
            self.max_duration = duration;
        }
        if file.max_iterations.is_some() {
            self.max_iterations = file.max_iterations;
        }
        if let Some(batch_size) = file.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(wait) = file.dequeue_wait {
            self.dequeue_wait = wait;
        }

        self.empty_result_policy = match (file.keep_alive, file.max_empty_results) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    "keepAlive and maxEmptyResults are mutually exclusive",
                ))
            }
            (Some(keep_alive), None) => EmptyResultPolicy::from_keep_alive(keep_alive),
            (None, Some(Some(threshold))) => EmptyResultPolicy::StopAfter(threshold),
            (None, Some(None)) => EmptyResultPolicy::NeverStop,
            (None, None) => self.empty_result_policy,
        };

        if let Some(retry) = file.poll_retry {
            self.poll_failure = PollFailurePolicy::Retry(retry);
        }
        if file.error_queue_name.is_some() {
            self.error_queue_name = file.error_queue_name;
        }
        if let Some(queue_name) = file.queue_name {
            self.queue_name = queue_name;
        }
        if let Some(env) = file.env {
            self.env = env;
        }

        Ok(self)
    }

    /// Reject configurations the worker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env.project_id.is_empty() || self.env.token.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        if self.queue_name.is_empty() {
            return Err(ConfigError::invalid("queueName must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batchSize must be at least 1"));
        }
        if Duration::try_from_secs_f64(self.reservation_timeout_secs()).is_err() {
            return Err(ConfigError::invalid("reservation timeout out of range"));
        }
        if self.error_queue_name.as_deref() == Some(self.queue_name.as_str()) {
            return Err(ConfigError::invalid(
                "errorQueueName must differ from queueName",
            ));
        }
        Ok(())
    }

    /// Reservation window for a full batch: every message taking the full
    /// simulated duration, plus ten percent.
    pub fn reservation_timeout_secs(&self) -> f64 {
        self.batch_size as f64 * self.msg_duration.as_secs_f64() * RESERVATION_MARGIN
    }

    /// Saturates at [`Duration::MAX`]; `validate` rejects configs that get there.
    pub fn reservation_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.reservation_timeout_secs()).unwrap_or(Duration::MAX)
    }

    /// Latest elapsed time at which another message may still be started.
    pub fn message_deadline(&self) -> Duration {
        self.max_duration.saturating_add(self.msg_duration)
    }

    /// The configuration in its JSON shape, every known field populated.
    pub fn to_file(&self) -> ConfigFile {
        let (max_empty_results, keep_alive) = match self.empty_result_policy {
            EmptyResultPolicy::StopAfter(threshold) => (Some(Some(threshold)), None),
            EmptyResultPolicy::NeverStop => (None, Some(true)),
        };
        let poll_retry = match &self.poll_failure {
            PollFailurePolicy::Abort => None,
            PollFailurePolicy::Retry(retry) => Some(retry.clone()),
        };

        ConfigFile {
            msg_duration: Some(self.msg_duration),
            iteration_sleep: Some(self.iteration_sleep),
            max_duration: Some(self.max_duration),
            max_iterations: self.max_iterations,
            batch_size: Some(self.batch_size),
            max_empty_results,
            keep_alive,
            dequeue_wait: Some(self.dequeue_wait),
            poll_retry,
            error_queue_name: self.error_queue_name.clone(),
            queue_name: Some(self.queue_name.clone()),
            env: Some(self.env.clone()),
        }
    }

    /// Four-space indented JSON of the configuration with the token masked.
    pub fn masked_json(&self) -> Result<String, serde_json::Error> {
        let mut file = self.to_file();
        file.env = Some(self.env.masked());

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        file.serialize(&mut serializer)?;

        // serde_json only ever writes UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// JSON shape of the worker configuration. Every field is optional; absent
/// fields keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default, with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub msg_duration: Option<Duration>,
    #[serde(default, with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub iteration_sleep: Option<Duration>,
    #[serde(default, with = "option_duration_serde", skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Outer `None`: absent. `Some(None)`: explicit `null`, never stop.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_empty_results: Option<Option<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dequeue_wait: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_retry: Option<PollRetryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_queue_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<QueueSettings>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Keep the first quarter of the token (by character) and mask the rest.
pub fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    let keep = len / 4;
    token
        .chars()
        .take(keep)
        .chain(std::iter::repeat('*').take(len - keep))
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Nanos(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            RawDuration::Nanos(nanos) => Ok(Duration::from_nanos(nanos)),
            RawDuration::Text(text) => humantime::parse_duration(&text).map_err(E::custom),
        }
    }
}

/// Durations as integer nanoseconds or human-readable strings on input,
/// human-readable strings on output.
pub mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::RawDuration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        RawDuration::deserialize(deserializer)?.into_duration()
    }
}

/// [`duration_serde`] for optional fields; `null` reads as `None`.
pub mod option_duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::RawDuration;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(duration) => {
                serializer.serialize_some(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<RawDuration>::deserialize(deserializer)?
            .map(RawDuration::into_duration)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn full_config() -> &'static str {
        r#"{
            "msgDuration": "2s",
            "iterationSleep": 50000000,
            "maxDuration": "10m",
            "maxIterations": 7,
            "batchSize": 5,
            "maxEmptyResults": 3,
            "dequeueWait": 10,
            "queueName": "jobs",
            "env": {"project_id": "p-1", "token": "abcdefghijklmnopqrst", "region": "us"}
        }"#
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.msg_duration, Duration::from_secs(1));
        assert_eq!(config.iteration_sleep, Duration::from_millis(20));
        assert_eq!(config.max_duration, Duration::from_secs(2700));
        assert_eq!(config.max_iterations, None);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.dequeue_wait, 0);
        assert_eq!(config.empty_result_policy, EmptyResultPolicy::StopAfter(0));
        assert_eq!(config.poll_failure, PollFailurePolicy::Abort);
    }

    #[test]
    fn test_full_document_overrides_defaults() {
        let config = WorkerConfig::from_json_str(full_config()).unwrap();
        assert_eq!(config.msg_duration, Duration::from_secs(2));
        assert_eq!(config.iteration_sleep, Duration::from_millis(50));
        assert_eq!(config.max_duration, Duration::from_secs(600));
        assert_eq!(config.max_iterations, Some(7));
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.empty_result_policy, EmptyResultPolicy::StopAfter(3));
        assert_eq!(config.dequeue_wait, 10);
        assert_eq!(config.queue_name, "jobs");
        assert_eq!(config.env.project_id, "p-1");
        assert_eq!(config.env.extra.get("region"), Some(&Value::from("us")));
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config =
            WorkerConfig::from_json_str(r#"{"queueName": "q", "batchSize": 3}"#).unwrap();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.msg_duration, Duration::from_secs(1));
        assert_eq!(config.empty_result_policy, EmptyResultPolicy::StopAfter(0));
    }

    #[test]
    fn test_keep_alive_maps_to_policy() {
        let config = WorkerConfig::from_json_str(r#"{"keepAlive": true}"#).unwrap();
        assert_eq!(config.empty_result_policy, EmptyResultPolicy::NeverStop);

        let config = WorkerConfig::from_json_str(r#"{"keepAlive": false}"#).unwrap();
        assert_eq!(config.empty_result_policy, EmptyResultPolicy::StopAfter(0));
    }

    #[test]
    fn test_null_max_empty_results_never_stops() {
        let config = WorkerConfig::from_json_str(r#"{"maxEmptyResults": null}"#).unwrap();
        assert_eq!(config.empty_result_policy, EmptyResultPolicy::NeverStop);
    }

    #[test]
    fn test_keep_alive_and_max_empty_results_conflict() {
        let err = WorkerConfig::from_json_str(r#"{"keepAlive": true, "maxEmptyResults": 2}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_duration_string_rejected() {
        let err = WorkerConfig::from_json_str(r#"{"msgDuration": "soon"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_poll_retry_enables_retry_policy() {
        let config =
            WorkerConfig::from_json_str(r#"{"pollRetry": {"maxAttempts": 5}}"#).unwrap();
        match config.poll_failure {
            PollFailurePolicy::Retry(retry) => assert_eq!(retry.max_attempts, 5),
            other => panic!("expected retry policy, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let config = WorkerConfig::from_json_str(r#"{"queueName": "q"}"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingCredentials)));

        let config = WorkerConfig::from_json_str(
            r#"{"queueName": "q", "env": {"project_id": "p", "token": ""}}"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::MissingCredentials)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = WorkerConfig::new("q", QueueSettings::new("p", "t")).with_batch_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_error_queue_must_differ() {
        let config = WorkerConfig::new("q", QueueSettings::new("p", "t")).with_error_queue("q");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_fills_missing_credentials() {
        let vars: HashMap<&str, &str> = [
            ("IRON_PROJECT_ID", "env-project"),
            ("IRON_TOKEN", "env-token"),
            ("IRON_HOST", "localhost"),
            ("IRON_PORT", "8080"),
        ]
        .into_iter()
        .collect();

        let mut settings = QueueSettings::default();
        settings.fill_from_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.project_id, "env-project");
        assert_eq!(settings.token, "env-token");
        assert_eq!(settings.host(), "localhost");
        assert_eq!(settings.port(), 8080);
        assert_eq!(settings.scheme(), DEFAULT_SCHEME);
        assert_eq!(settings.api_version(), DEFAULT_API_VERSION);
    }

    #[test]
    fn test_file_credentials_win_over_env() {
        let mut settings = QueueSettings::new("file-project", "file-token");
        settings.fill_from_env(|_| Some("env".to_string()));
        assert_eq!(settings.project_id, "file-project");
        assert_eq!(settings.token, "file-token");
    }

    #[test]
    fn test_load_without_file_uses_env() {
        let err = WorkerConfig::load_with_env(None, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = WorkerConfig::load_with_env(Some(Path::new("/nonexistent/drain.json")), no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_with_env_fills_token() {
        let path = std::env::temp_dir().join(format!("drain-config-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&path, r#"{"queueName": "jobs", "env": {"project_id": "p-1"}}"#).unwrap();

        let loaded = WorkerConfig::load_with_env(Some(path.as_path()), |key| {
            (key == "IRON_TOKEN").then(|| "env-token".to_string())
        });
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.queue_name, "jobs");
        assert_eq!(config.env.project_id, "p-1");
        assert_eq!(config.env.token, "env-token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mask_token_keeps_first_quarter() {
        assert_eq!(mask_token("abcdefghijklmnopqrst"), "abcde***************");
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token(""), "");
        assert_eq!(mask_token("abcd"), "a***");
    }

    #[test]
    fn test_mask_token_counts_characters() {
        let masked = mask_token("ééééé");
        assert_eq!(masked, "é****");
        assert_eq!(masked.chars().count(), 5);
    }

    #[test]
    fn test_mask_token_length_preserved_for_all_lengths() {
        for len in 0..64 {
            let token: String = "x".repeat(len);
            let masked = mask_token(&token);
            assert_eq!(masked.chars().count(), len);
            assert_eq!(masked.chars().filter(|c| *c == 'x').count(), len / 4);
            assert!(masked.chars().skip(len / 4).all(|c| c == '*'));
        }
    }

    #[test]
    fn test_masked_json_hides_token() {
        let config = WorkerConfig::from_json_str(full_config()).unwrap();
        let json = config.masked_json().unwrap();

        assert!(json.contains("\"token\": \"abcde***************\""));
        assert!(!json.contains("abcdefghijklmnopqrst"));
        assert!(json.contains("\n    \"msgDuration\": \"2s\""));
        assert!(json.contains("\"maxEmptyResults\": 3"));
        assert!(json.contains("\"region\": \"us\""));
    }

    #[test]
    fn test_masked_json_reads_back() {
        let config = WorkerConfig::from_json_str(full_config()).unwrap();
        let json = config.masked_json().unwrap();
        let reparsed = WorkerConfig::from_json_str(&json).unwrap();

        assert_eq!(reparsed.msg_duration, config.msg_duration);
        assert_eq!(reparsed.empty_result_policy, config.empty_result_policy);
        assert_eq!(reparsed.env.token, mask_token(&config.env.token));
    }

    #[test]
    fn test_keep_alive_printed_for_never_stop() {
        let config = WorkerConfig::new("q", QueueSettings::new("p", "t"))
            .with_empty_result_policy(EmptyResultPolicy::NeverStop);
        let json = config.masked_json().unwrap();
        assert!(json.contains("\"keepAlive\": true"));
        assert!(!json.contains("maxEmptyResults"));
    }

    #[test]
    fn test_reservation_timeout() {
        let config = WorkerConfig::default()
            .with_batch_size(10)
            .with_msg_duration(Duration::from_millis(1500));
        assert_eq!(config.reservation_timeout_secs(), 10.0 * 1.5 * 1.1);

        let config = WorkerConfig::default();
        assert_eq!(config.reservation_timeout_secs(), 1.0 * 1.0 * 1.1);
    }

    #[test]
    fn test_oversized_reservation_timeout_rejected() {
        let config = WorkerConfig::from_json_str(
            r#"{"queueName": "q", "batchSize": 18446744073709551615, "msgDuration": "1s",
                "env": {"project_id": "p", "token": "t"}}"#,
        )
        .unwrap();
        match config.validate() {
            Err(ConfigError::Invalid(reason)) => assert!(reason.contains("reservation timeout")),
            other => panic!("expected invalid config, got {other:?}"),
        }
        assert_eq!(config.reservation_timeout(), Duration::MAX);
    }

    #[test]
    fn test_empty_result_policy_threshold() {
        let policy = EmptyResultPolicy::StopAfter(2);
        assert!(!policy.should_stop(1));
        assert!(!policy.should_stop(2));
        assert!(policy.should_stop(3));

        assert!(EmptyResultPolicy::StopAfter(0).should_stop(1));
        assert!(!EmptyResultPolicy::NeverStop.should_stop(u32::MAX));
    }

    #[test]
    fn test_debug_masks_token() {
        let settings = QueueSettings::new("p", "supersecrettoken");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("supersecrettoken"));
        assert!(debug.contains("supe************"));
    }
}
