use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, instrument, warn};

use braid_core::files::ObjectStore;
use braid_core::ids::MessageRowId;
use braid_core::provider::ModelGateway;
use braid_core::stream::ChatEvent;
use braid_store::messages::{MessageRepo, MessageRow, MessageStatus};
use braid_store::{Database, Track};

use crate::history;

/// Streams a model reply into a placeholder message row.
///
/// Runs only as a deferred task: every failure is contained here and
/// reported through tracing — the operation that enqueued the reply has
/// already returned. Each delta rewrites the placeholder's full accumulated
/// content (last write wins, no partial-delta storage), so observers see a
/// strictly extending prefix chain.
pub struct ReplyEngine {
    gateway: Arc<dyn ModelGateway>,
    objects: Arc<dyn ObjectStore>,
    db: Database,
}

impl ReplyEngine {
    pub fn new(gateway: Arc<dyn ModelGateway>, objects: Arc<dyn ObjectStore>, db: Database) -> Self {
        Self { gateway, objects, db }
    }

    #[instrument(skip(self, history), fields(track = %track, placeholder = %placeholder, model))]
    pub async fn generate(
        &self,
        track: Track,
        placeholder: MessageRowId,
        model: &str,
        history: &[MessageRow],
    ) {
        let messages = MessageRepo::new(self.db.clone(), track);
        let turns = history::build_turns(history, self.objects.as_ref()).await;

        let mut stream = match self.gateway.stream_chat(model, &turns).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(kind = e.error_kind(), error = %e, "reply stream failed to open");
                self.mark(&messages, placeholder, MessageStatus::Failed);
                return;
            }
        };

        let mut accumulated = String::new();

        while let Some(event) = stream.next().await {
            match event {
                ChatEvent::Delta { text } => {
                    accumulated.push_str(&text);
                    match messages.update_content(placeholder, &accumulated) {
                        // Zero rows touched: the message (or its thread) was
                        // deleted mid-stream. Keep draining; writes stay no-ops.
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "placeholder update failed"),
                    }
                }
                ChatEvent::Error { error } => {
                    if error.is_retryable() {
                        warn!(kind = error.error_kind(), error = %error, "reply stream interrupted");
                    } else {
                        error!(kind = error.error_kind(), error = %error, "reply stream failed");
                    }
                    self.mark(&messages, placeholder, MessageStatus::Failed);
                    return;
                }
                ChatEvent::Done => break,
                ChatEvent::Start => {}
            }
        }

        self.mark(&messages, placeholder, MessageStatus::Complete);
    }

    fn mark(&self, messages: &MessageRepo, placeholder: MessageRowId, status: MessageStatus) {
        if let Err(e) = messages.set_status(placeholder, status) {
            warn!(error = %e, "placeholder status update failed");
        }
    }
}
