//! Canvas repository.

use crate::error::MetadataResult;
use crate::models::CanvasRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Keyset cursor for the eligibility scan.
///
/// The scan pages on the immutable `(created_at, canvas_id)` sort key,
/// so rows deleted behind the cursor never shift the rows still ahead
/// of it.
#[derive(Debug, Clone)]
pub struct CanvasCursor {
    pub created_at: OffsetDateTime,
    pub canvas_id: Uuid,
}

impl From<&CanvasRow> for CanvasCursor {
    fn from(row: &CanvasRow) -> Self {
        Self {
            created_at: row.created_at,
            canvas_id: row.canvas_id,
        }
    }
}

/// Repository for canvas rows.
#[async_trait]
pub trait CanvasRepo: Send + Sync {
    /// Create a canvas. Used by the application and by test fixtures;
    /// the cleanup engine itself never creates canvases.
    async fn create_canvas(&self, canvas: &CanvasRow) -> MetadataResult<()>;

    /// Get a canvas by id.
    async fn get_canvas(&self, canvas_id: Uuid) -> MetadataResult<Option<CanvasRow>>;

    /// One page of canvases matching the retention predicate:
    /// `(tile_count = 0 OR share triple all NULL) AND created_at <= cutoff`,
    /// ordered by `(created_at, canvas_id)`, starting after `cursor`.
    async fn list_expired_canvases(
        &self,
        cutoff: OffsetDateTime,
        cursor: Option<CanvasCursor>,
        limit: u32,
    ) -> MetadataResult<Vec<CanvasRow>>;

    /// Delete a canvas row, cascading dependent layer rows. Returns the
    /// number of canvas rows removed (0 if already gone).
    async fn delete_canvas(&self, canvas_id: Uuid) -> MetadataResult<u64>;

    /// Total number of canvas rows.
    async fn count_canvases(&self) -> MetadataResult<u64>;

    /// Whether any live canvas references the given preview blob key.
    async fn preview_key_referenced(&self, key: &str) -> MetadataResult<bool>;
}
