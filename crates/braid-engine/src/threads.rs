use tracing::instrument;

use braid_core::identity::Caller;
use braid_core::ids::{ThreadId, ThreadRowId};
use braid_store::messages::{MessageRepo, MessageStatus};
use braid_store::threads::{ThreadRepo, ThreadRow, DEFAULT_TITLE};
use braid_store::{Database, Track};

use crate::error::{require_identity, ServiceError};

/// Owns the thread lifecycle on both tracks: creation, listing, rename,
/// delete cascade, share visibility, and cloning of shared threads.
pub struct ThreadService {
    db: Database,
}

impl ThreadService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn repo(&self, caller: &Caller) -> ThreadRepo {
        ThreadRepo::new(self.db.clone(), Track::for_caller(caller))
    }

    /// Load a thread and check the caller owns it.
    fn owned(&self, caller: &Caller, row_id: ThreadRowId) -> Result<ThreadRow, ServiceError> {
        let thread = self.repo(caller).get(row_id)?;
        if thread.owner_id != caller.owner_id() {
            return Err(ServiceError::Forbidden("caller does not own this thread".into()));
        }
        Ok(thread)
    }

    #[instrument(skip(self), fields(thread_id = %id))]
    pub fn create_thread(&self, caller: &Caller, id: &ThreadId) -> Result<ThreadRow, ServiceError> {
        require_identity(caller)?;
        Ok(self.repo(caller).insert(id, DEFAULT_TITLE, false, caller.owner_id())?)
    }

    /// The caller's threads, most recently created first.
    #[instrument(skip(self))]
    pub fn get_threads(&self, caller: &Caller) -> Result<Vec<ThreadRow>, ServiceError> {
        require_identity(caller)?;
        Ok(self.repo(caller).list_by_owner(caller.owner_id())?)
    }

    #[instrument(skip(self, title), fields(row_id = %row_id))]
    pub fn update_thread_title(
        &self,
        caller: &Caller,
        row_id: ThreadRowId,
        title: &str,
    ) -> Result<(), ServiceError> {
        require_identity(caller)?;
        self.owned(caller, row_id)?;
        Ok(self.repo(caller).update_title(row_id, title)?)
    }

    /// Delete a thread and its messages. The cascade runs as one storage
    /// transaction.
    #[instrument(skip(self), fields(row_id = %row_id, thread_id = %external_id))]
    pub fn delete_thread(
        &self,
        caller: &Caller,
        row_id: ThreadRowId,
        external_id: &ThreadId,
    ) -> Result<(), ServiceError> {
        require_identity(caller)?;
        self.owned(caller, row_id)?;
        Ok(self
            .repo(caller)
            .delete_cascade(row_id, external_id, caller.owner_id())?)
    }

    /// Mark a thread public and return its storage id for link construction.
    #[instrument(skip(self), fields(row_id = %row_id))]
    pub fn share(&self, caller: &Caller, row_id: ThreadRowId) -> Result<ThreadRowId, ServiceError> {
        require_identity(caller)?;
        self.owned(caller, row_id)?;
        self.repo(caller).set_public(row_id)?;
        Ok(row_id)
    }

    /// Copy a public thread — title, messages, attachments — into a new
    /// private thread owned by the caller, under a fresh external id.
    #[instrument(skip(self), fields(source_row = %source_row))]
    pub fn clone_to_current_user(
        &self,
        caller: &Caller,
        source_row: ThreadRowId,
    ) -> Result<ThreadId, ServiceError> {
        if !caller.is_authenticated() {
            return Err(ServiceError::Unauthorized);
        }

        let threads = ThreadRepo::new(self.db.clone(), Track::Permanent);
        let source = threads.get(source_row)?;
        if !source.is_public {
            return Err(ServiceError::Forbidden("thread is not shared".into()));
        }

        let new_id = ThreadId::new();
        threads.insert(&new_id, &source.title, false, caller.owner_id())?;

        let messages = MessageRepo::new(self.db.clone(), Track::Permanent);
        for message in messages.list_by_thread(&source.id)? {
            messages.insert(
                &new_id,
                &message.content,
                &message.author,
                caller.owner_id(),
                &message.files,
                MessageStatus::Complete,
            )?;
        }

        Ok(new_id)
    }
}
