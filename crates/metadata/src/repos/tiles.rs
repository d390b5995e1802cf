//! Tile repository.

use crate::error::MetadataResult;
use crate::models::TileRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for tile rows.
#[async_trait]
pub trait TileRepo: Send + Sync {
    /// Create a tile. Used by the application and by test fixtures.
    async fn create_tile(&self, tile: &TileRow) -> MetadataResult<()>;

    /// Get a tile by id.
    async fn get_tile(&self, tile_id: Uuid) -> MetadataResult<Option<TileRow>>;

    /// All tiles belonging to a canvas.
    async fn list_tiles_for_canvas(&self, canvas_id: Uuid) -> MetadataResult<Vec<TileRow>>;

    /// Delete all tiles for a canvas in a single statement. Returns the
    /// number of rows removed.
    async fn delete_tiles_for_canvas(&self, canvas_id: Uuid) -> MetadataResult<u64>;

    /// Tiles whose `canvas_id` matches no existing canvas (Orphan Class A).
    async fn list_orphan_tiles(&self) -> MetadataResult<Vec<TileRow>>;

    /// Delete all orphaned tiles in a single statement. Returns the
    /// number of rows removed.
    async fn delete_orphan_tiles(&self) -> MetadataResult<u64>;

    /// Total number of tile rows.
    async fn count_tiles(&self) -> MetadataResult<u64>;

    /// Whether any live tile references the given blob key.
    async fn tile_key_referenced(&self, key: &str) -> MetadataResult<bool>;
}
