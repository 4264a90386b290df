use async_trait::async_trait;
use dashmap::DashMap;

use braid_core::files::{ObjectStore, UploadTicket};
use braid_core::ids::StorageId;

/// In-memory object store. Upload URLs are minted eagerly with a fresh
/// storage id; resolution succeeds only for ids this instance issued.
/// Stands in for the external blob service in development and tests.
pub struct MemoryObjectStore {
    base_url: String,
    objects: DashMap<String, String>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: DashMap::new(),
        }
    }

    /// Register an existing id (test fixture convenience).
    pub fn register(&self, id: &StorageId) -> String {
        let url = format!("{}/{}", self.base_url, id);
        self.objects.insert(id.as_str().to_string(), url.clone());
        url
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://files")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_upload_url(&self) -> UploadTicket {
        let storage_id = StorageId::new();
        let url = self.register(&storage_id);
        UploadTicket { storage_id, url }
    }

    async fn resolve_url(&self, id: &StorageId) -> Option<String> {
        self.objects.get(id.as_str()).map(|entry| entry.clone())
    }
}
