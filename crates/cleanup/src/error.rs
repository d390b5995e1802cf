//! Cleanup error types.
//!
//! Two layers: `CleanupError` is control flow (a run that cannot start
//! or cannot continue); `RunError` is data (a per-item failure recorded
//! in the run's error list and audit record while the run carries on).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Errors that end (or prevent) a cleanup run.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// Another run holds the lock. Expected under overlapping schedules;
    /// callers log and skip rather than alert.
    #[error("cleanup lock held by {holder} since {held_at}")]
    LockHeld {
        holder: String,
        held_at: OffsetDateTime,
    },

    /// A metadata query failed at the orchestration level. The run
    /// aborts; the lock is still released; no audit record is written.
    #[error("metadata store failure: {0}")]
    Metadata(#[from] tessera_metadata::MetadataError),

    /// A blob store listing failed during orphan reconciliation.
    #[error("blob store failure: {0}")]
    Storage(#[from] tessera_storage::StorageError),

    /// The run's error list could not be serialized for the audit record.
    #[error("failed to serialize run errors: {0}")]
    Audit(#[from] serde_json::Error),
}

impl CleanupError {
    /// Whether this is the expected "another run is active" outcome.
    pub fn is_lock_held(&self) -> bool {
        matches!(self, Self::LockHeld { .. })
    }
}

/// Classification of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// A canvas could not be deleted; it stays eligible for a later run.
    ContainerDelete,
    /// A tile blob survived both delete attempts during canvas deletion.
    TileBlobDelete,
    /// A preview blob survived both delete attempts during canvas deletion.
    PreviewBlobDelete,
    /// An orphaned blob survived both delete attempts during reconciliation.
    OrphanBlobDelete,
}

impl RunErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContainerDelete => "container_delete",
            Self::TileBlobDelete => "tile_blob_delete",
            Self::PreviewBlobDelete => "preview_blob_delete",
            Self::OrphanBlobDelete => "orphan_blob_delete",
        }
    }
}

/// One per-item failure: what kind, which canvas or blob key, and the
/// underlying error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub subject: String,
    pub message: String,
}

impl RunError {
    pub fn new(kind: RunErrorKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind.as_str(), self.subject, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_errors_serialize_with_tagged_kind() {
        let err = RunError::new(RunErrorKind::TileBlobDelete, "tiles/a/b.png", "io error");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""kind":"tile_blob_delete""#));

        let back: RunError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, RunErrorKind::TileBlobDelete);
        assert_eq!(back.subject, "tiles/a/b.png");
    }

    #[test]
    fn lock_held_is_distinguishable() {
        let err = CleanupError::LockHeld {
            holder: "runner-a".to_string(),
            held_at: OffsetDateTime::now_utc(),
        };
        assert!(err.is_lock_held());
        assert!(err.to_string().contains("runner-a"));
    }
}
