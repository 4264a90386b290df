use tracing::instrument;

use braid_core::identity::{Caller, ClientId};
use braid_core::ids::{MessageRowId, ThreadId};
use braid_store::messages::{MessageRepo, MessageStatus};
use braid_store::threads::ThreadRepo;
use braid_store::{Database, Track};

use crate::error::{require_identity, ServiceError};

/// Marker prefixed to a branched thread's title.
const BRANCH_MARKER: &str = "\u{1F33F} ";

/// Copies conversation prefixes and whole tracks across thread boundaries:
/// branching within a track, and promotion of anonymous data into the
/// permanent track on login.
pub struct LineageService {
    db: Database,
}

impl LineageService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Copy the caller's messages up to and including `cutoff` into a new
    /// thread with a fresh external id. An unknown cutoff copies the whole
    /// thread — degenerate but well-defined. Works identically on both
    /// tracks.
    #[instrument(skip(self), fields(thread_id = %thread_id, cutoff = %cutoff))]
    pub fn branch_off(
        &self,
        caller: &Caller,
        thread_id: &ThreadId,
        cutoff: MessageRowId,
    ) -> Result<ThreadId, ServiceError> {
        require_identity(caller)?;
        let track = Track::for_caller(caller);

        let threads = ThreadRepo::new(self.db.clone(), track);
        let source = threads
            .get_by_external_id(thread_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("thread {thread_id}")))?;

        let messages = MessageRepo::new(self.db.clone(), track);
        let mut prefix = Vec::new();
        for message in messages.list_by_thread_for_owner(thread_id, caller.owner_id())? {
            let is_cutoff = message.row_id == cutoff;
            prefix.push(message);
            if is_cutoff {
                break;
            }
        }

        let new_id = ThreadId::new();
        for message in &prefix {
            messages.insert(
                &new_id,
                &message.content,
                &message.author,
                caller.owner_id(),
                &message.files,
                MessageStatus::Complete,
            )?;
        }

        threads.insert(
            &new_id,
            &format!("{BRANCH_MARKER}{}", source.title),
            false,
            caller.owner_id(),
        )?;

        Ok(new_id)
    }

    /// Migrate every temporary-track thread and message owned by
    /// `anonymous_id` into the permanent track under the authenticated
    /// caller. Rows move one at a time (insert, then delete), matching the
    /// original system: a mid-promotion failure leaves the remaining
    /// temporary rows in place and the call can simply run again.
    /// Attachments are dropped — the temporary track never carries files.
    #[instrument(skip(self), fields(anonymous_id = %anonymous_id))]
    pub fn promote(&self, caller: &Caller, anonymous_id: &ClientId) -> Result<(), ServiceError> {
        if !caller.is_authenticated() {
            return Err(ServiceError::Unauthorized);
        }
        if anonymous_id.is_blank() {
            return Err(ServiceError::InvalidArgument(
                "anonymous client id is required".into(),
            ));
        }

        let temp_threads = ThreadRepo::new(self.db.clone(), Track::Temporary);
        let temp_messages = MessageRepo::new(self.db.clone(), Track::Temporary);
        let threads = ThreadRepo::new(self.db.clone(), Track::Permanent);
        let messages = MessageRepo::new(self.db.clone(), Track::Permanent);

        for thread in temp_threads.list_by_owner(anonymous_id.as_str())? {
            threads.insert(&thread.id, &thread.title, thread.is_public, caller.owner_id())?;
            temp_threads.delete(thread.row_id)?;

            for message in
                temp_messages.list_by_thread_for_owner(&thread.id, anonymous_id.as_str())?
            {
                messages.insert(
                    &thread.id,
                    &message.content,
                    &message.author,
                    caller.owner_id(),
                    &[],
                    MessageStatus::Complete,
                )?;
                temp_messages.delete(message.row_id)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::identity::UserId;
    use braid_store::threads::DEFAULT_TITLE;

    fn setup() -> (LineageService, Database) {
        let db = Database::in_memory().unwrap();
        (LineageService::new(db.clone()), db)
    }

    fn user(id: &str) -> Caller {
        Caller::User(UserId::from_raw(id))
    }

    fn anon(id: &str) -> Caller {
        Caller::Anonymous(ClientId::from_raw(id))
    }

    fn seed_thread(
        db: &Database,
        track: Track,
        thread: &str,
        owner: &str,
        contents: &[(&str, &str)],
    ) -> (ThreadRepo, MessageRepo, Vec<MessageRowId>) {
        let threads = ThreadRepo::new(db.clone(), track);
        let messages = MessageRepo::new(db.clone(), track);
        let tid = ThreadId::from_raw(thread);
        threads.insert(&tid, "Source thread", false, owner).unwrap();
        let ids = contents
            .iter()
            .map(|(content, author)| {
                messages
                    .insert(&tid, content, author, owner, &[], MessageStatus::Complete)
                    .unwrap()
                    .row_id
            })
            .collect();
        (threads, messages, ids)
    }

    #[test]
    fn branch_copies_prefix_through_cutoff() {
        let (svc, db) = setup();
        let (_, messages, ids) = seed_thread(
            &db,
            Track::Permanent,
            "t1",
            "u1",
            &[("one", "human"), ("two", "m1"), ("three", "human")],
        );

        let new_id = svc
            .branch_off(&user("u1"), &ThreadId::from_raw("t1"), ids[1])
            .unwrap();

        let branched = messages.list_by_thread(&new_id).unwrap();
        assert_eq!(branched.len(), 2);
        assert_eq!(branched[0].content, "one");
        assert_eq!(branched[0].author, "human");
        assert_eq!(branched[1].content, "two");
        assert_eq!(branched[1].author, "m1");
    }

    #[test]
    fn branch_title_carries_marker() {
        let (svc, db) = setup();
        let (threads, _, ids) =
            seed_thread(&db, Track::Permanent, "t1", "u1", &[("one", "human")]);

        let new_id = svc
            .branch_off(&user("u1"), &ThreadId::from_raw("t1"), ids[0])
            .unwrap();

        let branched = threads.get_by_external_id(&new_id).unwrap().unwrap();
        assert_eq!(branched.title, "\u{1F33F} Source thread");
        assert!(!branched.is_public);
    }

    #[test]
    fn unknown_cutoff_copies_whole_thread() {
        let (svc, db) = setup();
        let (_, messages, _) = seed_thread(
            &db,
            Track::Permanent,
            "t1",
            "u1",
            &[("one", "human"), ("two", "m1")],
        );

        let new_id = svc
            .branch_off(&user("u1"), &ThreadId::from_raw("t1"), MessageRowId::from_raw(9999))
            .unwrap();

        assert_eq!(messages.list_by_thread(&new_id).unwrap().len(), 2);
    }

    #[test]
    fn branch_of_missing_thread_aborts_before_mutation() {
        let (svc, db) = setup();
        let result = svc.branch_off(&user("u1"), &ThreadId::from_raw("nope"), MessageRowId::from_raw(1));
        assert!(matches!(result, Err(ServiceError::NotFound(_))));

        let messages = MessageRepo::new(db, Track::Permanent);
        assert!(messages.list_by_owner("u1").unwrap().is_empty());
    }

    #[test]
    fn branch_works_on_temporary_track() {
        let (svc, db) = setup();
        let (threads, messages, ids) =
            seed_thread(&db, Track::Temporary, "t1", "c1", &[("anon msg", "human")]);

        let new_id = svc
            .branch_off(&anon("c1"), &ThreadId::from_raw("t1"), ids[0])
            .unwrap();

        assert_eq!(messages.list_by_thread(&new_id).unwrap().len(), 1);
        assert!(threads.get_by_external_id(&new_id).unwrap().is_some());

        // Nothing leaked into the permanent track.
        let permanent = MessageRepo::new(db, Track::Permanent);
        assert!(permanent.list_by_thread(&new_id).unwrap().is_empty());
    }

    #[test]
    fn promote_moves_everything_and_empties_temporary_track() {
        let (svc, db) = setup();
        seed_thread(
            &db,
            Track::Temporary,
            "t1",
            "c1",
            &[("hi", "human"), ("hello", "m1")],
        );
        let temp_threads = ThreadRepo::new(db.clone(), Track::Temporary);
        let tid2 = ThreadId::from_raw("t2");
        temp_threads.insert(&tid2, DEFAULT_TITLE, false, "c1").unwrap();

        svc.promote(&user("u1"), &ClientId::from_raw("c1")).unwrap();

        // Zero temporary rows left for c1.
        assert!(temp_threads.list_by_owner("c1").unwrap().is_empty());
        let temp_messages = MessageRepo::new(db.clone(), Track::Temporary);
        assert!(temp_messages.list_by_owner("c1").unwrap().is_empty());

        // Everything recreated under the caller, same external ids.
        let threads = ThreadRepo::new(db.clone(), Track::Permanent);
        let mine = threads.list_by_owner("u1").unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|t| t.owner_id == "u1"));

        let messages = MessageRepo::new(db, Track::Permanent);
        let moved = messages.list_by_thread(&ThreadId::from_raw("t1")).unwrap();
        assert_eq!(moved.len(), 2);
        assert_eq!(moved[0].content, "hi");
        assert_eq!(moved[1].content, "hello");
        assert!(moved.iter().all(|m| m.owner_id == "u1" && m.files.is_empty()));
    }

    #[test]
    fn promote_leaves_other_owners_temporary_data() {
        let (svc, db) = setup();
        seed_thread(&db, Track::Temporary, "t1", "c1", &[("mine", "human")]);
        seed_thread(&db, Track::Temporary, "t2", "c2", &[("theirs", "human")]);

        svc.promote(&user("u1"), &ClientId::from_raw("c1")).unwrap();

        let temp_threads = ThreadRepo::new(db, Track::Temporary);
        assert_eq!(temp_threads.list_by_owner("c2").unwrap().len(), 1);
    }

    #[test]
    fn promote_requires_authentication() {
        let (svc, _db) = setup();
        let result = svc.promote(&anon("c1"), &ClientId::from_raw("c1"));
        assert!(matches!(result, Err(ServiceError::Unauthorized)));
    }

    #[test]
    fn promote_rejects_blank_anonymous_id() {
        let (svc, _db) = setup();
        let result = svc.promote(&user("u1"), &ClientId::from_raw(" "));
        assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
    }
}
