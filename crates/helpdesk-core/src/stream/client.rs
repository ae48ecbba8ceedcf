use crate::config::ApiSettings;
use crate::error::ChatError;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

/// Raw response body fragments, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ChatError>> + Send>>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Body of the streaming request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub query: String,
    pub chat_history: Vec<HistoryEntry>,
}

/// The streaming answer service.
#[async_trait::async_trait]
pub trait AnswerClient: Send + Sync {
    /// Dispatch `request` and return the response body as a byte stream.
    async fn stream_answer(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;
}

pub struct HttpAnswerClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpAnswerClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: Duration::from_secs(crate::constants::api::REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn from_settings(settings: &ApiSettings) -> Self {
        Self::new(settings.stream_url()).with_timeout(settings.request_timeout())
    }

    /// Limit on the wait for response headers. The body stream itself is not
    /// bounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl AnswerClient for HttpAnswerClient {
    async fn stream_answer(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let pending = self.client.post(&self.url).json(request).send();
        let response = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| {
                ChatError::Transport(format!("no response within {}s", self.timeout.as_secs()))
            })??;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status { status, body });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ChatError::from));
        Ok(Box::pin(stream))
    }
}
