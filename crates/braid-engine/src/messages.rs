use serde::{Deserialize, Serialize};
use tracing::instrument;

use braid_core::files::Attachment;
use braid_core::identity::Caller;
use braid_core::ids::{ThreadId, ThreadRowId};
use braid_core::turns::HUMAN_AUTHOR;
use braid_gateway::models;
use braid_store::messages::{MessageRepo, MessageRow, MessageStatus};
use braid_store::threads::{ThreadRepo, DEFAULT_TITLE};
use braid_store::{Database, Track};

use crate::error::{require_identity, ServiceError};
use crate::tasks::{Task, TaskQueue};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateMessage {
    pub thread_id: ThreadId,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub files: Vec<Attachment>,
}

/// Owns creation and reads of chat messages on both tracks, enforces the
/// human/AI pairing invariant, and triggers deferred reply and title
/// generation.
pub struct MessageService {
    db: Database,
    queue: TaskQueue,
}

impl MessageService {
    pub fn new(db: Database, queue: TaskQueue) -> Self {
        Self { db, queue }
    }

    /// Persist a message. A human message carrying a model id additionally
    /// gets a paired empty placeholder authored by that model, one deferred
    /// reply task, and — while the thread still wears its sentinel title —
    /// one deferred title task. The caller never waits on the model.
    #[instrument(skip(self, req), fields(thread_id = %req.thread_id, author = %req.author))]
    pub fn create_message(&self, caller: &Caller, req: CreateMessage) -> Result<(), ServiceError> {
        require_identity(caller)?;
        let track = Track::for_caller(caller);

        let wants_reply = req.author == HUMAN_AUTHOR && req.model.is_some();
        if wants_reply {
            if let (Caller::Anonymous(_), Some(model)) = (caller, &req.model) {
                if !models::allowed_for_anonymous(model) {
                    return Err(ServiceError::Forbidden(
                        "model not available to anonymous users".into(),
                    ));
                }
            }
        }

        let messages = MessageRepo::new(self.db.clone(), track);

        // The temporary track never carries files.
        let files: &[Attachment] = match track {
            Track::Permanent => &req.files,
            Track::Temporary => &[],
        };

        messages.insert(
            &req.thread_id,
            &req.content,
            &req.author,
            caller.owner_id(),
            files,
            MessageStatus::Complete,
        )?;

        let Some(model) = req.model.filter(|_| wants_reply) else {
            return Ok(());
        };

        // History snapshot includes the human message just written, but not
        // the placeholder inserted next.
        let history = messages.list_by_thread_for_owner(&req.thread_id, caller.owner_id())?;

        let placeholder = messages.insert(
            &req.thread_id,
            "",
            &model,
            caller.owner_id(),
            &[],
            MessageStatus::Pending,
        )?;

        self.queue.enqueue(Task::GenerateReply {
            track,
            placeholder: placeholder.row_id,
            model,
            history,
        });

        let threads = ThreadRepo::new(self.db.clone(), track);
        if let Some(thread) = threads.get_by_external_id(&req.thread_id)? {
            if thread.title == DEFAULT_TITLE {
                self.queue.enqueue(Task::GenerateTitle {
                    track,
                    thread: thread.row_id,
                    first_message: req.content,
                });
            }
        }

        Ok(())
    }

    /// The caller's messages in a thread, in insertion order. Unknown
    /// threads yield an empty list, not an error.
    #[instrument(skip(self), fields(thread_id = %thread_id))]
    pub fn get_messages(
        &self,
        caller: &Caller,
        thread_id: &ThreadId,
    ) -> Result<Vec<MessageRow>, ServiceError> {
        require_identity(caller)?;
        let track = Track::for_caller(caller);
        let messages = MessageRepo::new(self.db.clone(), track);
        Ok(messages.list_by_thread_for_owner(thread_id, caller.owner_id())?)
    }

    /// Read a publicly shared thread's messages — the sharing owner's rows,
    /// unfiltered. Only authenticated callers may follow share links.
    #[instrument(skip(self), fields(thread_row = %thread_row))]
    pub fn get_shared_messages(
        &self,
        caller: &Caller,
        thread_row: ThreadRowId,
    ) -> Result<Vec<MessageRow>, ServiceError> {
        if !caller.is_authenticated() {
            return Err(ServiceError::Unauthorized);
        }

        let threads = ThreadRepo::new(self.db.clone(), Track::Permanent);
        let thread = threads.get(thread_row)?;

        let messages = MessageRepo::new(self.db.clone(), Track::Permanent);
        Ok(messages.list_by_thread(&thread.id)?)
    }

    /// All attachments across the caller's messages, flattened.
    #[instrument(skip(self))]
    pub fn list_attachments(&self, caller: &Caller) -> Result<Vec<Attachment>, ServiceError> {
        require_identity(caller)?;
        let track = Track::for_caller(caller);
        let messages = MessageRepo::new(self.db.clone(), track);
        let rows = messages.list_by_owner(caller.owner_id())?;
        Ok(rows.into_iter().flat_map(|m| m.files).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use braid_core::identity::{ClientId, UserId};
    use braid_core::ids::StorageId;
    use braid_gateway::{MockGateway, MockResponse};
    use braid_store::objects::MemoryObjectStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::reply::ReplyEngine;
    use crate::tasks::run_task;
    use crate::title::TitleGenerator;

    fn service() -> (MessageService, Database, UnboundedReceiver<Task>) {
        let db = Database::in_memory().unwrap();
        let (queue, rx) = TaskQueue::new();
        (MessageService::new(db.clone(), queue), db, rx)
    }

    fn user() -> Caller {
        Caller::User(UserId::from_raw("u1"))
    }

    fn anon() -> Caller {
        Caller::Anonymous(ClientId::from_raw("c1"))
    }

    fn req(thread: &str, content: &str, model: Option<&str>) -> CreateMessage {
        CreateMessage {
            thread_id: ThreadId::from_raw(thread),
            content: content.into(),
            author: HUMAN_AUTHOR.into(),
            model: model.map(str::to_owned),
            files: vec![],
        }
    }

    #[test]
    fn human_message_with_model_creates_exactly_one_placeholder() {
        let (svc, _db, mut rx) = service();
        svc.create_message(&user(), req("t1", "hi", Some("m1"))).unwrap();

        let msgs = svc.get_messages(&user(), &ThreadId::from_raw("t1")).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].author, "human");
        assert_eq!(msgs[0].content, "hi");
        assert_eq!(msgs[1].author, "m1");
        assert_eq!(msgs[1].content, "");
        assert_eq!(msgs[1].status, MessageStatus::Pending);
        assert_eq!(msgs[1].thread_id, msgs[0].thread_id);
        assert_eq!(msgs[1].owner_id, msgs[0].owner_id);

        // Exactly one reply task referencing the placeholder.
        let task = rx.try_recv().unwrap();
        match task {
            Task::GenerateReply { placeholder, model, history, .. } => {
                assert_eq!(placeholder, msgs[1].row_id);
                assert_eq!(model, "m1");
                assert_eq!(history.len(), 1);
                assert_eq!(history[0].content, "hi");
            }
            other => panic!("expected reply task, got {other:?}"),
        }
        assert!(rx.try_recv().is_err()); // no thread row yet, so no title task
    }

    #[test]
    fn message_without_model_enqueues_nothing() {
        let (svc, _db, mut rx) = service();
        svc.create_message(&user(), req("t1", "just a note", None)).unwrap();
        assert!(rx.try_recv().is_err());

        let msgs = svc.get_messages(&user(), &ThreadId::from_raw("t1")).unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn ai_authored_message_never_pairs() {
        let (svc, _db, mut rx) = service();
        let mut r = req("t1", "I am a reply", Some("m1"));
        r.author = "m1".into();
        svc.create_message(&user(), r).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sentinel_title_triggers_title_task() {
        let (svc, db, mut rx) = service();
        let threads = ThreadRepo::new(db, Track::Permanent);
        let t = threads
            .insert(&ThreadId::from_raw("t1"), DEFAULT_TITLE, false, "u1")
            .unwrap();

        svc.create_message(&user(), req("t1", "first!", Some("m1"))).unwrap();

        let _reply = rx.try_recv().unwrap();
        let title = rx.try_recv().unwrap();
        match title {
            Task::GenerateTitle { thread, first_message, .. } => {
                assert_eq!(thread, t.row_id);
                assert_eq!(first_message, "first!");
            }
            other => panic!("expected title task, got {other:?}"),
        }
    }

    #[test]
    fn renamed_thread_gets_no_title_task() {
        let (svc, db, mut rx) = service();
        let threads = ThreadRepo::new(db, Track::Permanent);
        threads
            .insert(&ThreadId::from_raw("t1"), "Already titled", false, "u1")
            .unwrap();

        svc.create_message(&user(), req("t1", "more", Some("m1"))).unwrap();

        let _reply = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn blank_anonymous_id_rejected_before_any_write() {
        let (svc, db, _rx) = service();
        let blank = Caller::Anonymous(ClientId::from_raw("  "));
        let result = svc.create_message(&blank, req("t1", "hi", None));
        assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));

        let messages = MessageRepo::new(db, Track::Temporary);
        assert!(messages.list_by_thread(&ThreadId::from_raw("t1")).unwrap().is_empty());
    }

    #[test]
    fn anonymous_model_allow_list_enforced() {
        let (svc, db, _rx) = service();
        let result = svc.create_message(&anon(), req("t1", "hi", Some("anthropic/claude-v3-haiku")));
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));

        // Aborted before any mutation.
        let messages = MessageRepo::new(db, Track::Temporary);
        assert!(messages.list_by_thread(&ThreadId::from_raw("t1")).unwrap().is_empty());
    }

    #[test]
    fn anonymous_caller_writes_temporary_track() {
        let (svc, db, mut rx) = service();
        svc.create_message(&anon(), req("t1", "hi", Some("openai/gpt-4o-mini"))).unwrap();

        assert!(matches!(rx.try_recv().unwrap(), Task::GenerateReply { track: Track::Temporary, .. }));

        let permanent = MessageRepo::new(db.clone(), Track::Permanent);
        assert!(permanent.list_by_thread(&ThreadId::from_raw("t1")).unwrap().is_empty());
        let temporary = MessageRepo::new(db, Track::Temporary);
        assert_eq!(temporary.list_by_thread(&ThreadId::from_raw("t1")).unwrap().len(), 2);
    }

    #[test]
    fn temporary_track_drops_files() {
        let (svc, _db, _rx) = service();
        let mut r = req("t1", "with file", None);
        r.files = vec![Attachment {
            storage_id: StorageId::from_raw("file_1"),
            mime_type: "image/png".into(),
            display_name: "cat.png".into(),
        }];
        svc.create_message(&anon(), r).unwrap();

        let msgs = svc.get_messages(&anon(), &ThreadId::from_raw("t1")).unwrap();
        assert!(msgs[0].files.is_empty());
    }

    #[test]
    fn get_messages_filters_to_caller() {
        let (svc, _db, _rx) = service();
        svc.create_message(&user(), req("t1", "mine", None)).unwrap();
        svc.create_message(&Caller::User(UserId::from_raw("u2")), req("t1", "theirs", None))
            .unwrap();

        let mine = svc.get_messages(&user(), &ThreadId::from_raw("t1")).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].content, "mine");
    }

    #[test]
    fn get_messages_on_unknown_thread_is_empty() {
        let (svc, _db, _rx) = service();
        assert!(svc.get_messages(&user(), &ThreadId::from_raw("nope")).unwrap().is_empty());
    }

    #[test]
    fn shared_messages_skip_owner_filter() {
        let (svc, db, _rx) = service();
        let threads = ThreadRepo::new(db, Track::Permanent);
        let t = threads
            .insert(&ThreadId::from_raw("t1"), "Shared", true, "owner")
            .unwrap();
        svc.create_message(&Caller::User(UserId::from_raw("owner")), req("t1", "shared content", None))
            .unwrap();

        let viewer = Caller::User(UserId::from_raw("viewer"));
        let msgs = svc.get_shared_messages(&viewer, t.row_id).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].owner_id, "owner");
    }

    #[test]
    fn shared_messages_require_authentication() {
        let (svc, db, _rx) = service();
        let threads = ThreadRepo::new(db, Track::Permanent);
        let t = threads
            .insert(&ThreadId::from_raw("t1"), "Shared", true, "owner")
            .unwrap();

        let result = svc.get_shared_messages(&anon(), t.row_id);
        assert!(matches!(result, Err(ServiceError::Unauthorized)));
    }

    #[test]
    fn shared_messages_for_missing_thread_not_found() {
        let (svc, _db, _rx) = service();
        let result = svc.get_shared_messages(&user(), ThreadRowId::from_raw(404));
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn attachments_flattened_across_threads() {
        let (svc, _db, _rx) = service();
        for (thread, file) in [("t1", "file_a"), ("t2", "file_b")] {
            let mut r = req(thread, "with file", None);
            r.files = vec![Attachment {
                storage_id: StorageId::from_raw(file),
                mime_type: "application/pdf".into(),
                display_name: format!("{file}.pdf"),
            }];
            svc.create_message(&user(), r).unwrap();
        }

        let atts = svc.list_attachments(&user()).unwrap();
        assert_eq!(atts.len(), 2);
    }

    #[tokio::test]
    async fn end_to_end_streaming_scenario() {
        // create thread t1; send {content:"hi", by:"human", model:"m1"};
        // deliver deltas "Hel","lo!" — second message reads "Hello!".
        let db = Database::in_memory().unwrap();
        let (queue, mut rx) = TaskQueue::new();
        let svc = MessageService::new(db.clone(), queue);

        let threads = ThreadRepo::new(db.clone(), Track::Permanent);
        threads
            .insert(&ThreadId::from_raw("t1"), DEFAULT_TITLE, false, "u1")
            .unwrap();

        svc.create_message(&user(), req("t1", "hi", Some("m1"))).unwrap();

        let gateway = Arc::new(
            MockGateway::new(vec![MockResponse::stream_deltas(&["Hel", "lo!"])])
                .with_completions(vec![Ok("Greeting".into())]),
        );
        let reply = ReplyEngine::new(
            gateway.clone(),
            Arc::new(MemoryObjectStore::default()),
            db.clone(),
        );
        let titler = TitleGenerator::new(gateway, db);

        while let Ok(task) = rx.try_recv() {
            run_task(task, &reply, &titler).await;
        }

        let msgs = svc.get_messages(&user(), &ThreadId::from_raw("t1")).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].content, "hi");
        assert_eq!(msgs[1].content, "Hello!");
        assert_eq!(msgs[1].status, MessageStatus::Complete);

        let thread = threads
            .get_by_external_id(&ThreadId::from_raw("t1"))
            .unwrap()
            .unwrap();
        assert_eq!(thread.title, "Greeting");
    }
}
