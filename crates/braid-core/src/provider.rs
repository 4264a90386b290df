use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::errors::GatewayError;
use crate::stream::ChatEvent;
use crate::turns::ChatTurn;

pub type ChatStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Boundary to the externally-hosted model inference endpoint.
///
/// `stream_chat` yields incremental text deltas for a conversation;
/// `complete` is the non-streaming variant used for one-shot generations
/// such as thread titles.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn stream_chat(
        &self,
        model: &str,
        turns: &[ChatTurn],
    ) -> Result<ChatStream, GatewayError>;

    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, GatewayError>;
}
