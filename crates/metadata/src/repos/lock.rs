//! Cleanup run lock repository.

use crate::error::MetadataResult;
use crate::models::LockRow;
use async_trait::async_trait;

/// Repository for the singleton cleanup run lock.
#[async_trait]
pub trait LockRepo: Send + Sync {
    /// Atomically insert the lock row. Returns `false` without error if
    /// a lock row already exists; exactly one of two concurrent inserts
    /// succeeds.
    async fn try_insert_lock(&self, lock: &LockRow) -> MetadataResult<bool>;

    /// Read the current lock row, if any.
    async fn get_lock(&self) -> MetadataResult<Option<LockRow>>;

    /// Delete the lock row. Idempotent.
    async fn delete_lock(&self) -> MetadataResult<()>;
}
