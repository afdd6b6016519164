//! Streaming chat exchange client

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::{
    error::{Error, Result},
    frame::{Frame, FrameDecoder},
    stream::{ChatEvent, ChatEventStream},
    types::{ChatRequest, ConversationType, Message},
};

/// Trait for chat exchange endpoints
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Issue one exchange carrying the full history.
    ///
    /// Fails before producing any event if the endpoint rejects the request.
    async fn send(
        &self,
        history: &[Message],
        conversation_type: &ConversationType,
    ) -> Result<ChatEventStream>;
}

/// Chat client speaking the line-framed streaming HTTP protocol
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl HttpChatClient {
    /// Create a client for the given endpoint URL
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    /// Create a client that gives up connecting after `timeout`.
    ///
    /// Only the connect phase is bounded; replies may stream for as long as
    /// the endpoint keeps sending.
    pub fn with_connect_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Self::with_client(endpoint, client)
    }

    /// Create a client reusing an existing reqwest client
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(Error::InvalidConfig("chat endpoint is empty".into()));
        }
        Ok(Self {
            client,
            endpoint,
            headers: HeaderMap::new(),
        })
    }

    /// Add a header sent with every exchange
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = name
            .parse::<HeaderName>()
            .map_err(|e| Error::InvalidConfig(format!("header name {}: {}", name, e)))?;
        let value = value
            .parse::<HeaderValue>()
            .map_err(|e| Error::InvalidConfig(format!("header value for {}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// The endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn send(
        &self,
        history: &[Message],
        conversation_type: &ConversationType,
    ) -> Result<ChatEventStream> {
        let request = ChatRequest {
            messages: history,
            conversation_type,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status.as_u16(), body));
        }

        tracing::debug!(
            "Chat exchange opened ({} messages, type {})",
            history.len(),
            conversation_type
        );

        Ok(Box::pin(create_stream(response)))
    }
}

fn create_stream(response: reqwest::Response) -> impl futures::Stream<Item = ChatEvent> {
    stream! {
        let mut body = response.bytes_stream();
        let mut decoder = FrameDecoder::new();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield ChatEvent::Error {
                        message: Error::Stream(e.to_string()).to_string(),
                    };
                    return;
                }
            };

            for frame in decoder.push(&chunk) {
                match frame {
                    Frame::Delta(text) => {
                        yield ChatEvent::Delta { text };
                    }
                    Frame::Done => {
                        yield ChatEvent::Done;
                        return;
                    }
                    Frame::Malformed(payload) => {
                        tracing::debug!("Skipping malformed frame: {}", payload);
                    }
                }
            }
        }

        match decoder.finish() {
            Some(Frame::Delta(text)) => {
                yield ChatEvent::Delta { text };
            }
            Some(Frame::Malformed(payload)) => {
                tracing::debug!("Skipping malformed frame: {}", payload);
            }
            Some(Frame::Done) | None => {}
        }

        tracing::debug!("Chat body ended without sentinel, treating as complete");
        yield ChatEvent::Done;
    }
}
