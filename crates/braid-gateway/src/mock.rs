use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;

use braid_core::errors::GatewayError;
use braid_core::provider::{ChatStream, ModelGateway};
use braid_core::stream::ChatEvent;
use braid_core::turns::ChatTurn;

/// Pre-programmed responses for deterministic testing without network calls.
pub enum MockResponse {
    /// Yield a sequence of ChatEvents.
    Stream(Vec<ChatEvent>),
    /// Return an error from the stream_chat() call itself.
    Error(GatewayError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: a well-formed stream delivering the given deltas in order.
    pub fn stream_deltas(deltas: &[&str]) -> Self {
        let mut events = vec![ChatEvent::Start];
        events.extend(deltas.iter().map(|d| ChatEvent::Delta { text: (*d).to_string() }));
        events.push(ChatEvent::Done);
        Self::Stream(events)
    }

    /// Convenience: a single-delta text response.
    pub fn stream_text(text: &str) -> Self {
        Self::stream_deltas(&[text])
    }

    /// Convenience: deliver some deltas, then fail mid-stream.
    pub fn stream_error_after(deltas: &[&str], error: GatewayError) -> Self {
        let mut events = vec![ChatEvent::Start];
        events.extend(deltas.iter().map(|d| ChatEvent::Delta { text: (*d).to_string() }));
        events.push(ChatEvent::Error { error });
        Self::Stream(events)
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock gateway that returns pre-programmed responses in sequence.
/// Streaming and completion scripts are independent queues.
pub struct MockGateway {
    responses: Mutex<VecDeque<MockResponse>>,
    completions: Mutex<VecDeque<Result<String, GatewayError>>>,
    chat_calls: AtomicUsize,
    completion_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            completions: Mutex::new(VecDeque::new()),
            chat_calls: AtomicUsize::new(0),
            completion_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_completions(self, completions: Vec<Result<String, GatewayError>>) -> Self {
        *self.completions.lock() = completions.into();
        self
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::Relaxed)
    }

    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(
        &self,
        _model: &str,
        _turns: &[ChatTurn],
    ) -> Result<ChatStream, GatewayError> {
        let idx = self.chat_calls.fetch_add(1, Ordering::Relaxed);

        let Some(response) = self.responses.lock().pop_front() else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockGateway: no response configured for call {idx}"
            )));
        };

        resolve_response(response).await
    }

    async fn complete(
        &self,
        _model: &str,
        _system: &str,
        _prompt: &str,
    ) -> Result<String, GatewayError> {
        let idx = self.completion_calls.fetch_add(1, Ordering::Relaxed);

        match self.completions.lock().pop_front() {
            Some(result) => result,
            None => Err(GatewayError::InvalidRequest(format!(
                "MockGateway: no completion configured for call {idx}"
            ))),
        }
    }
}

/// Resolve a MockResponse, handling Delay by sleeping first.
/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: MockResponse) -> Result<ChatStream, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Stream(events) => {
                return Ok(Box::pin(stream::iter(events)));
            }
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn delta_sequence_response() {
        let mock = MockGateway::new(vec![MockResponse::stream_deltas(&["Hel", "lo!"])]);
        let mut stream = mock.stream_chat("m1", &[]).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert_eq!(events.len(), 4); // Start, Delta, Delta, Done
        assert!(matches!(events[0], ChatEvent::Start));
        assert!(matches!(&events[1], ChatEvent::Delta { text } if text == "Hel"));
        assert!(matches!(&events[2], ChatEvent::Delta { text } if text == "lo!"));
        assert!(matches!(events[3], ChatEvent::Done));
    }

    #[tokio::test]
    async fn error_response() {
        let mock = MockGateway::new(vec![MockResponse::Error(
            GatewayError::AuthenticationFailed("bad".into()),
        )]);
        let result = mock.stream_chat("m1", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mid_stream_error() {
        let mock = MockGateway::new(vec![MockResponse::stream_error_after(
            &["partial"],
            GatewayError::ProviderOverloaded,
        )]);
        let mut stream = mock.stream_chat("m1", &[]).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert!(matches!(&events[1], ChatEvent::Delta { text } if text == "partial"));
        assert!(matches!(events.last(), Some(ChatEvent::Error { .. })));
    }

    #[tokio::test]
    async fn sequential_responses() {
        let mock = MockGateway::new(vec![
            MockResponse::stream_text("first"),
            MockResponse::stream_text("second"),
        ]);

        assert!(mock.stream_chat("m1", &[]).await.is_ok());
        assert_eq!(mock.chat_calls(), 1);

        assert!(mock.stream_chat("m1", &[]).await.is_ok());
        assert_eq!(mock.chat_calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_responses() {
        let mock = MockGateway::new(vec![MockResponse::stream_text("only one")]);
        let _ = mock.stream_chat("m1", &[]).await;
        assert!(mock.stream_chat("m1", &[]).await.is_err());
    }

    #[tokio::test]
    async fn scripted_completions() {
        let mock = MockGateway::new(vec![])
            .with_completions(vec![Ok("Rust ownership questions".to_string())]);

        let title = mock.complete("m1", "system", "first message").await.unwrap();
        assert_eq!(title, "Rust ownership questions");
        assert_eq!(mock.completion_calls(), 1);

        assert!(mock.complete("m1", "system", "again").await.is_err());
    }

    #[tokio::test]
    async fn delayed_response() {
        let mock = MockGateway::new(vec![MockResponse::delayed(
            Duration::from_millis(50),
            MockResponse::stream_text("after delay"),
        )]);

        let start = std::time::Instant::now();
        let mut stream = mock.stream_chat("m1", &[]).await.unwrap();
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(40),
            "Delay should have waited ~50ms, got {elapsed:?}"
        );

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn gateway_properties() {
        let mock = MockGateway::new(vec![]);
        assert_eq!(mock.name(), "mock");
    }
}
