use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ids::StorageId;

/// Descriptor for a file attached to a message. The bytes themselves live in
/// object storage; messages carry only the reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub storage_id: StorageId,
    pub mime_type: String,
    pub display_name: String,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }
}

/// A pre-issued upload destination: the client PUTs bytes to `url` and then
/// references the object by `storage_id` when creating a message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadTicket {
    pub storage_id: StorageId,
    pub url: String,
}

/// Boundary to binary object storage for uploaded files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue a fresh upload destination.
    async fn create_upload_url(&self) -> UploadTicket;

    /// Resolve a stored object's retrievable URL, or None if the id is
    /// unknown.
    async fn resolve_url(&self, id: &StorageId) -> Option<String>;
}
