use tracing::debug;

use braid_core::files::ObjectStore;
use braid_core::turns::{ChatTurn, Role, TurnContent, HUMAN_AUTHOR};
use braid_store::messages::MessageRow;

/// Transform a thread's message history into the gateway's structured turn
/// format. Human messages become user turns carrying their text plus
/// resolved attachment references — images as image URLs, PDFs as file
/// URLs; other mime types stay stored on the message but are not shown to
/// the model. AI messages become assistant turns with only their text.
pub async fn build_turns(history: &[MessageRow], objects: &dyn ObjectStore) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(history.len());

    for message in history {
        if message.author == HUMAN_AUTHOR {
            let mut content = vec![TurnContent::Text { text: message.content.clone() }];
            for file in &message.files {
                let Some(url) = objects.resolve_url(&file.storage_id).await else {
                    debug!(storage_id = %file.storage_id, "attachment unresolvable — skipped");
                    continue;
                };
                if file.is_image() {
                    content.push(TurnContent::Image { url });
                } else if file.is_pdf() {
                    content.push(TurnContent::File { url });
                }
            }
            turns.push(ChatTurn { role: Role::User, content });
        } else {
            turns.push(ChatTurn::assistant_text(message.content.clone()));
        }
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::files::Attachment;
    use braid_core::ids::{MessageRowId, StorageId, ThreadId};
    use braid_store::messages::MessageStatus;
    use braid_store::objects::MemoryObjectStore;

    fn row(author: &str, content: &str, files: Vec<Attachment>) -> MessageRow {
        MessageRow {
            row_id: MessageRowId::from_raw(1),
            thread_id: ThreadId::from_raw("t1"),
            content: content.into(),
            author: author.into(),
            owner_id: "u1".into(),
            files,
            status: MessageStatus::Complete,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    fn att(id: &StorageId, mime: &str) -> Attachment {
        Attachment {
            storage_id: id.clone(),
            mime_type: mime.into(),
            display_name: "f".into(),
        }
    }

    #[tokio::test]
    async fn roles_mapped_from_author() {
        let objects = MemoryObjectStore::default();
        let history = vec![row("human", "hi", vec![]), row("m1", "hello", vec![])];

        let turns = build_turns(&history, &objects).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text_content(), "hello");
    }

    #[tokio::test]
    async fn image_and_pdf_attachments_passed_by_reference() {
        let objects = MemoryObjectStore::default();
        let img = StorageId::from_raw("file_img");
        let pdf = StorageId::from_raw("file_pdf");
        let img_url = objects.register(&img);
        let pdf_url = objects.register(&pdf);

        let history = vec![row(
            "human",
            "see attached",
            vec![att(&img, "image/png"), att(&pdf, "application/pdf")],
        )];

        let turns = build_turns(&history, &objects).await;
        assert_eq!(turns[0].content.len(), 3);
        assert_eq!(turns[0].content[1], TurnContent::Image { url: img_url });
        assert_eq!(turns[0].content[2], TurnContent::File { url: pdf_url });
    }

    #[tokio::test]
    async fn unsupported_mime_types_dropped_from_model_view() {
        let objects = MemoryObjectStore::default();
        let zip = StorageId::from_raw("file_zip");
        objects.register(&zip);

        let history = vec![row("human", "archive", vec![att(&zip, "application/zip")])];

        let turns = build_turns(&history, &objects).await;
        assert_eq!(turns[0].content.len(), 1); // text only
    }

    #[tokio::test]
    async fn unresolvable_attachment_skipped() {
        let objects = MemoryObjectStore::default();
        let missing = StorageId::from_raw("file_missing");

        let history = vec![row("human", "gone", vec![att(&missing, "image/png")])];

        let turns = build_turns(&history, &objects).await;
        assert_eq!(turns[0].content.len(), 1);
    }

    #[tokio::test]
    async fn assistant_turns_carry_text_only() {
        let objects = MemoryObjectStore::default();
        let img = StorageId::from_raw("file_img");
        objects.register(&img);

        // Files on an AI message (possible after a clone) are never
        // forwarded to the model.
        let history = vec![row("m1", "earlier reply", vec![att(&img, "image/png")])];

        let turns = build_turns(&history, &objects).await;
        assert_eq!(turns[0].content.len(), 1);
        assert_eq!(turns[0].role, Role::Assistant);
    }
}
