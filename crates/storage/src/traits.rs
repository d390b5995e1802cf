//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Key and size of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

/// Key-addressed blob store.
///
/// The cleanup engine consumes `head`, `delete`, and `list`; `put`,
/// `get`, and `exists` exist for the application side and for test
/// fixtures that stage blobs.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's size without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object. Backends that can tell may report an absent
    /// key as `NotFound`; callers treat that the same as success.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List objects under a prefix with their sizes.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectMeta>>;

    /// Static identifier for the backend type, for logging.
    fn backend_name(&self) -> &'static str;
}
