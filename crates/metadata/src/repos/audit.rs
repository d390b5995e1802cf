//! Cleanup audit trail repository.

use crate::error::MetadataResult;
use crate::models::AuditRecordRow;
use async_trait::async_trait;

/// Repository for the append-only cleanup audit trail. Records are
/// inserted once per run and never updated or deleted; there is
/// deliberately no update or delete operation on this trait.
#[async_trait]
pub trait AuditRepo: Send + Sync {
    /// Persist one audit record.
    async fn insert_audit_record(&self, record: &AuditRecordRow) -> MetadataResult<()>;

    /// Get an audit record by id.
    async fn get_audit_record(&self, audit_id: &str) -> MetadataResult<Option<AuditRecordRow>>;

    /// Most recent audit records, newest first.
    async fn list_recent_audit_records(&self, limit: u32) -> MetadataResult<Vec<AuditRecordRow>>;
}
