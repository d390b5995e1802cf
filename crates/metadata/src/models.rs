//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Canvas record: the top-level content unit subject to retention.
///
/// Created and mutated by the Tessera application; this subsystem only
/// reads and deletes canvases. `tile_count` is a denormalized counter
/// maintained by the application. The share triple (`share_lat`,
/// `share_lng`, `share_zoom`) is set all-or-nothing when a canvas is
/// published to the shared map.
#[derive(Debug, Clone, FromRow)]
pub struct CanvasRow {
    pub canvas_id: Uuid,
    pub created_at: OffsetDateTime,
    pub tile_count: i64,
    pub share_lat: Option<f64>,
    pub share_lng: Option<f64>,
    pub share_zoom: Option<i64>,
    pub preview_blob_key: Option<String>,
}

impl CanvasRow {
    /// Whether the share triple is set (canvas published to the map).
    pub fn is_shared(&self) -> bool {
        self.share_lat.is_some() && self.share_lng.is_some() && self.share_zoom.is_some()
    }
}

/// Tile record referencing a canvas and a blob.
///
/// `canvas_id` is an application-managed reference, not a declared
/// foreign key, so a tile row can outlive its canvas (Orphan Class A).
#[derive(Debug, Clone, FromRow)]
pub struct TileRow {
    pub tile_id: Uuid,
    pub canvas_id: Uuid,
    pub blob_key: String,
    pub updated_at: OffsetDateTime,
}

/// Layer record. Unlike tiles, layers declare a foreign key and are
/// removed by cascade when their canvas row is deleted.
#[derive(Debug, Clone, FromRow)]
pub struct LayerRow {
    pub layer_id: Uuid,
    pub canvas_id: Uuid,
    pub layer_name: String,
    pub z_index: i64,
    pub created_at: OffsetDateTime,
}

/// Singleton cleanup run lock. At most one valid row exists; `lock_id`
/// is constrained to 1 so a competing insert fails atomically.
#[derive(Debug, Clone, FromRow)]
pub struct LockRow {
    pub lock_id: i64,
    pub holder: String,
    pub held_at: OffsetDateTime,
}

/// One immutable audit record per completed cleanup run.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct AuditRecordRow {
    pub audit_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    pub canvases_deleted: i64,
    pub tiles_deleted: i64,
    /// Approximate: counts deleted canvases that had tiles, not the
    /// cascaded layer rows themselves.
    pub layers_deleted: i64,
    pub previews_deleted: i64,
    /// Orphan Class A: dangling tile rows removed.
    pub orphan_tiles_deleted: i64,
    /// Blobs removed for orphaned tiles (Class A per-row deletes plus
    /// the `tiles/` namespace sweep).
    pub orphan_tile_blobs_deleted: i64,
    /// Orphan Class B: unreferenced `previews/` blobs removed.
    pub orphan_previews_deleted: i64,
    pub bytes_reclaimed: i64,
    pub total_tiles_before: i64,
    pub total_tiles_after: i64,
    /// JSON-serialized list of per-item run errors, or NULL for a clean run.
    pub errors_json: Option<String>,
    pub duration_ms: i64,
}
