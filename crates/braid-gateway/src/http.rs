use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Future, Stream};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use braid_core::errors::GatewayError;
use braid_core::provider::{ChatStream, ModelGateway};
use braid_core::stream::ChatEvent;
use braid_core::turns::ChatTurn;

use crate::sse::{self, parse_gateway_event};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const SSE_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// HTTP client for the externally-hosted model gateway. Streams chat
/// completions over SSE and issues one-shot completions for titles.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<SecretString>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::NetworkError(format!("build client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, path: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key.expose_secret());
        }
        req = req.header("accept", "application/json");
        req.json(body)
    }
}

#[derive(Deserialize)]
struct CompletionBody {
    text: String,
}

#[async_trait]
impl ModelGateway for HttpGateway {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, turns), fields(model, turn_count = turns.len()))]
    async fn stream_chat(
        &self,
        model: &str,
        turns: &[ChatTurn],
    ) -> Result<ChatStream, GatewayError> {
        let body = serde_json::json!({
            "model": model,
            "messages": turns,
            "stream": true,
        });

        let resp = self
            .request("/v1/chat", &body)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, body));
        }

        let byte_stream = resp.bytes_stream();
        Ok(Box::pin(SseStream::new(byte_stream)))
    }

    #[instrument(skip(self, system, prompt), fields(model))]
    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, GatewayError> {
        let body = serde_json::json!({
            "model": model,
            "system": system,
            "prompt": prompt,
        });

        let resp = self
            .request("/v1/complete", &body)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, body));
        }

        let completion: CompletionBody = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidRequest(format!("malformed completion body: {e}")))?;

        Ok(completion.text)
    }
}

/// Wraps a byte stream from reqwest and yields ChatEvents.
/// Includes an idle timeout — if no data arrives within `idle_duration`,
/// emits a mid-stream error event.
struct SseStream {
    inner: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    pending: Vec<ChatEvent>,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
}

impl SseStream {
    fn new(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self::with_idle_timeout(byte_stream, SSE_IDLE_TIMEOUT)
    }

    fn with_idle_timeout(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
            pending: Vec::new(),
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
        }
    }

    fn drain_buffer_chunk(&mut self, chunk: &str) {
        for (event_type, data) in sse::parse_sse_lines(chunk) {
            if let Some(event) = parse_gateway_event(&event_type, &data) {
                self.pending.push(event);
            }
        }
    }
}

impl Stream for SseStream {
    type Item = ChatEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        if !self.pending.is_empty() {
            return std::task::Poll::Ready(Some(self.pending.remove(0)));
        }

        loop {
            match self.inner.as_mut().poll_next(cx) {
                std::task::Poll::Ready(Some(Ok(bytes))) => {
                    // Data received — reset idle timer
                    let new_deadline = tokio::time::Instant::now() + self.idle_duration;
                    self.idle_deadline.as_mut().reset(new_deadline);

                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    self.buffer.push_str(&text);

                    // Process complete SSE events from the buffer
                    while let Some(pos) = self.buffer.find("\n\n") {
                        let chunk = self.buffer[..pos + 2].to_string();
                        self.buffer = self.buffer[pos + 2..].to_string();
                        self.drain_buffer_chunk(&chunk);
                    }

                    if !self.pending.is_empty() {
                        return std::task::Poll::Ready(Some(self.pending.remove(0)));
                    }
                }
                std::task::Poll::Ready(Some(Err(e))) => {
                    return std::task::Poll::Ready(Some(ChatEvent::Error {
                        error: GatewayError::StreamInterrupted(e.to_string()),
                    }));
                }
                std::task::Poll::Ready(None) => {
                    // Stream ended — process remaining buffer
                    if !self.buffer.is_empty() {
                        let remaining = std::mem::take(&mut self.buffer);
                        self.drain_buffer_chunk(&remaining);
                        if !self.pending.is_empty() {
                            return std::task::Poll::Ready(Some(self.pending.remove(0)));
                        }
                    }
                    return std::task::Poll::Ready(None);
                }
                std::task::Poll::Pending => {
                    // No data available — check idle timeout
                    if self.idle_deadline.as_mut().poll(cx).is_ready() {
                        return std::task::Poll::Ready(Some(ChatEvent::Error {
                            error: GatewayError::StreamInterrupted(format!(
                                "idle timeout after {}s",
                                self.idle_duration.as_secs()
                            )),
                        }));
                    }
                    return std::task::Poll::Pending;
                }
            }
        }
    }
}
