//! External lookup of extra survey questions.
//!
//! A topic change produces a [`QuestionRequest`] tagged with a generation
//! number. Responses come back as [`QuestionResponse`] values and are applied
//! by the owning session only while their generation is still the latest one
//! issued, so a slow response for an abandoned topic never overwrites the
//! questions of the current topic.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub const DEFAULT_QUESTIONS_ENDPOINT: &str = "https://api.example.com/survey-questions";

/// Extra free-text question supplied for a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescriptor {
    pub label: String,
    pub name: String,
}

/// Descriptors together with the topic they were fetched for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuestionSet {
    pub topic: String,
    pub descriptors: Vec<QuestionDescriptor>,
}

#[derive(Debug, Error)]
pub enum SupplierError {
    #[error("question lookup transport failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("question lookup returned status {0}")]
    Status(u16),
    #[error("question lookup returned an unreadable body: {0}")]
    Decode(String),
}

#[async_trait]
pub trait QuestionSupplier: Send + Sync {
    async fn fetch(&self, topic: &str) -> Result<Vec<QuestionDescriptor>, SupplierError>;
}

/// A lookup issued for one topic value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRequest {
    pub generation: u64,
    pub topic: String,
}

/// The outcome of a lookup, still carrying its request tag.
#[derive(Debug)]
pub struct QuestionResponse {
    pub request: QuestionRequest,
    pub result: Result<Vec<QuestionDescriptor>, SupplierError>,
}

/// Runs one lookup to completion.
pub async fn fetch_questions(
    supplier: &dyn QuestionSupplier,
    request: QuestionRequest,
) -> QuestionResponse {
    debug!(topic = %request.topic, generation = request.generation, "fetching questions");
    let result = supplier.fetch(&request.topic).await;
    QuestionResponse { request, result }
}

/// Runs a lookup on the tokio runtime and delivers the response on `tx`.
pub fn spawn_fetch(
    supplier: Arc<dyn QuestionSupplier>,
    request: QuestionRequest,
    tx: UnboundedSender<QuestionResponse>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let response = fetch_questions(supplier.as_ref(), request).await;
        if tx.send(response).is_err() {
            debug!("question response dropped; session is gone");
        }
    })
}

/// Settings for [`HttpQuestionSupplier`].
#[derive(Debug, Clone)]
pub struct SupplierConfig {
    pub endpoint: String,
    pub timeout: Option<Duration>,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_QUESTIONS_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

/// Fetches `GET <endpoint>?topic=<topic>` and expects a JSON array of descriptors.
pub struct HttpQuestionSupplier {
    config: SupplierConfig,
    http_client: reqwest::Client,
}

impl HttpQuestionSupplier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SupplierError> {
        Self::with_config(SupplierConfig {
            endpoint: endpoint.into(),
            ..SupplierConfig::default()
        })
    }

    /// Builds the HTTP client; a client that cannot honour the config is an error.
    pub fn with_config(config: SupplierConfig) -> Result<Self, SupplierError> {
        let mut builder = reqwest::Client::builder().user_agent("form-kit/0.1");
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(SupplierError::Transport)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl QuestionSupplier for HttpQuestionSupplier {
    async fn fetch(&self, topic: &str) -> Result<Vec<QuestionDescriptor>, SupplierError> {
        let response = self
            .http_client
            .get(&self.config.endpoint)
            .query(&[("topic", topic)])
            .send()
            .await
            .map_err(SupplierError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupplierError::Status(status.as_u16()));
        }

        response
            .json::<Vec<QuestionDescriptor>>()
            .await
            .map_err(|err| SupplierError::Decode(err.to_string()))
    }
}

/// In-memory topic table; unknown topics have no extra questions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticQuestionSupplier {
    topics: BTreeMap<String, Vec<QuestionDescriptor>>,
}

impl StaticQuestionSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic: &str, descriptors: Vec<QuestionDescriptor>) -> Self {
        self.topics.insert(topic.to_string(), descriptors);
        self
    }

    /// Parses `{ "<topic>": [{ "label": .., "name": .. }] }`.
    pub fn from_json(json: &str) -> Result<Self, SupplierError> {
        serde_json::from_str(json).map_err(|err| SupplierError::Decode(err.to_string()))
    }
}

#[async_trait]
impl QuestionSupplier for StaticQuestionSupplier {
    async fn fetch(&self, topic: &str) -> Result<Vec<QuestionDescriptor>, SupplierError> {
        Ok(self.topics.get(topic).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_supplier_answers_known_topics() {
        let supplier = StaticQuestionSupplier::from_json(
            r#"{ "Health": [{ "label": "Sleep hours", "name": "sleepHours" }] }"#,
        )
        .expect("table");
        let request = QuestionRequest {
            generation: 1,
            topic: "Health".into(),
        };
        let response = fetch_questions(&supplier, request.clone()).await;
        assert_eq!(response.request, request);
        let descriptors = response.result.expect("descriptors");
        assert_eq!(descriptors[0].name, "sleepHours");
        assert!(supplier.fetch("Education").await.expect("empty").is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let supplier = HttpQuestionSupplier::with_config(SupplierConfig {
            endpoint: "http://127.0.0.1:9/survey-questions".into(),
            timeout: Some(Duration::from_secs(2)),
        })
        .expect("client");
        let err = supplier.fetch("Technology").await.expect_err("no server");
        assert!(matches!(err, SupplierError::Transport(_)));
    }

    #[test]
    fn http_supplier_keeps_configured_endpoint() {
        let supplier = HttpQuestionSupplier::new("http://localhost:8080/questions").expect("client");
        assert_eq!(supplier.endpoint(), "http://localhost:8080/questions");
    }
}
