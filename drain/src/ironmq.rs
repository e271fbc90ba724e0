//! HTTP client for the IronMQ v3 REST API.
//!
//! Covers only the calls the worker makes: queue info, reservations
//! (long-poll), delete and push. There are no retries here; the worker's
//! poll policy decides what a failure means.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QueueSettings;
use crate::error::QueueError;
use crate::queue::{LongPollRequest, MessageId, QueueClient, QueueInfo, ReservedMessage};

const DEFAULT_USER_AGENT: &str = concat!("drain/", env!("CARGO_PKG_VERSION"));

/// Upper bound on any request that does not set its own timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Slack on top of the long-poll wait before the HTTP request times out.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct InfoResponse {
    queue: QueueInfo,
}

#[derive(Serialize)]
struct ReserveBody {
    n: usize,
    timeout: u64,
    wait: u32,
    delete: bool,
}

#[derive(Deserialize)]
struct ReserveResponse {
    #[serde(default)]
    messages: Vec<ReservedMessage>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reservation_id: Option<&'a str>,
}

#[derive(Serialize)]
struct PushBody<'a> {
    messages: Vec<PushMessage<'a>>,
}

#[derive(Serialize)]
struct PushMessage<'a> {
    body: &'a str,
}

#[derive(Deserialize)]
struct PushResponse {
    #[serde(default)]
    ids: Vec<MessageId>,
}

/// A [`QueueClient`] bound to one named queue.
#[derive(Clone, Debug)]
pub struct IronMqClient {
    http: Client,
    queue_url: Url,
    queue_name: String,
    token: String,
    user_agent: String,
}

impl IronMqClient {
    /// Build a client for `queue_name` with a fresh HTTP client.
    pub fn new(settings: &QueueSettings, queue_name: impl Into<String>) -> Result<Self, QueueError> {
        Self::with_request_timeout(settings, queue_name, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Like [`IronMqClient::new`] with a different default request timeout.
    /// Long-polls still get their wait plus slack.
    pub fn with_request_timeout(
        settings: &QueueSettings,
        queue_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, QueueError> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_http_client(http, settings, queue_name)
    }

    /// Build a client sharing an existing HTTP client.
    pub fn with_http_client(
        http: Client,
        settings: &QueueSettings,
        queue_name: impl Into<String>,
    ) -> Result<Self, QueueError> {
        let queue_name = queue_name.into();
        let root = format!(
            "{}://{}:{}/",
            settings.scheme(),
            settings.host(),
            settings.port()
        );
        let mut queue_url = Url::parse(&root)
            .map_err(|err| QueueError::other(format!("invalid queue endpoint {root}: {err}")))?;
        queue_url
            .path_segments_mut()
            .map_err(|_| QueueError::other(format!("queue endpoint {root} cannot take a path")))?
            .pop_if_empty()
            .extend([
                settings.api_version(),
                "projects",
                settings.project_id.as_str(),
                "queues",
                queue_name.as_str(),
            ]);

        Ok(Self {
            http,
            queue_url,
            queue_name,
            token: settings.token.clone(),
            user_agent: settings
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// URL of the queue resource itself.
    pub fn queue_url(&self) -> &Url {
        &self.queue_url
    }

    /// Client for a sibling queue in the same project.
    pub fn for_queue(&self, queue_name: impl Into<String>) -> Result<Self, QueueError> {
        let queue_name = queue_name.into();
        let mut queue_url = self.queue_url.clone();
        queue_url
            .path_segments_mut()
            .map_err(|_| QueueError::other("queue endpoint cannot take a path"))?
            .pop()
            .push(&queue_name);

        Ok(Self {
            queue_url,
            queue_name,
            ..self.clone()
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, QueueError> {
        let mut url = self.queue_url.clone();
        url.path_segments_mut()
            .map_err(|_| QueueError::other("queue endpoint cannot take a path"))?
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, format!("OAuth {}", self.token))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, QueueError> {
        let response = Self::send_checked(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| QueueError::Decode(err.to_string()))
    }

    async fn send_checked(request: RequestBuilder) -> Result<reqwest::Response, QueueError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(QueueError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl QueueClient for IronMqClient {
    async fn info(&self) -> Result<QueueInfo, QueueError> {
        let request = self.request(Method::GET, self.queue_url.clone());
        let response: InfoResponse = Self::send(request).await?;
        Ok(response.queue)
    }

    async fn long_poll(
        &self,
        request: LongPollRequest,
    ) -> Result<Vec<ReservedMessage>, QueueError> {
        let body = ReserveBody {
            n: request.n,
            timeout: request.reservation_timeout_secs(),
            wait: request.wait_secs,
            delete: request.delete_on_receive,
        };
        debug!(
            queue = %self.queue_name,
            n = body.n,
            timeout = body.timeout,
            wait = body.wait,
            "reserving messages"
        );

        let http_request = self
            .request(Method::POST, self.url(&["reservations"])?)
            .timeout(Duration::from_secs(u64::from(request.wait_secs)) + REQUEST_TIMEOUT_SLACK)
            .json(&body);
        let response: ReserveResponse = Self::send(http_request).await?;
        Ok(response.messages)
    }

    async fn delete(&self, message: &ReservedMessage) -> Result<(), QueueError> {
        let body = DeleteBody {
            reservation_id: message.reservation_id.as_ref().map(|id| id.0.as_str()),
        };
        let request = self
            .request(Method::DELETE, self.url(&["messages", message.id.as_str()])?)
            .json(&body);
        Self::send_checked(request).await?;
        Ok(())
    }

    async fn push(&self, bodies: Vec<String>) -> Result<Vec<MessageId>, QueueError> {
        let body = PushBody {
            messages: bodies.iter().map(|body| PushMessage { body }).collect(),
        };
        let request = self
            .request(Method::POST, self.url(&["messages"])?)
            .json(&body);
        let response: PushResponse = Self::send(request).await?;
        Ok(response.ids)
    }
}
