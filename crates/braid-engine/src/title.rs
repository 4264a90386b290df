use std::sync::Arc;

use tracing::{error, instrument, warn};

use braid_core::ids::ThreadRowId;
use braid_core::provider::ModelGateway;
use braid_gateway::models::TITLE_MODEL;
use braid_store::threads::ThreadRepo;
use braid_store::{Database, Track};

const TITLE_SYSTEM_PROMPT: &str = "You are a helpful assistant that creates concise and \
informative titles for chat threads based on the user's first message. Your titles should \
accurately reflect the topic or intent of the message. Respond only with the thread title. \
The title should be no more than 10 words.";

/// Generates a thread title from its first message, as a deferred task.
/// The result overwrites whatever title the thread has by then — a
/// concurrent manual rename loses or wins purely by write order.
pub struct TitleGenerator {
    gateway: Arc<dyn ModelGateway>,
    db: Database,
}

impl TitleGenerator {
    pub fn new(gateway: Arc<dyn ModelGateway>, db: Database) -> Self {
        Self { gateway, db }
    }

    #[instrument(skip(self, first_message), fields(track = %track, thread = %thread))]
    pub async fn generate(&self, track: Track, thread: ThreadRowId, first_message: &str) {
        let title = match self
            .gateway
            .complete(TITLE_MODEL, TITLE_SYSTEM_PROMPT, first_message)
            .await
        {
            Ok(title) => title,
            Err(e) => {
                error!(kind = e.error_kind(), error = %e, "title generation failed");
                return;
            }
        };

        let threads = ThreadRepo::new(self.db.clone(), track);
        if let Err(e) = threads.update_title(thread, &title) {
            warn!(error = %e, "title write failed");
        }
    }
}
