//! Blob key layout.
//!
//! The blob store holds two namespaces owned by this subsystem: tile
//! images under `tiles/` and share preview images under `previews/`.
//! Keys are stored verbatim in the metadata rows that reference them,
//! so the cleanup engine treats stored keys as opaque and only uses the
//! prefixes below when sweeping for unreferenced objects.

use uuid::Uuid;

/// Prefix under which tile images live.
pub const TILE_PREFIX: &str = "tiles/";

/// Prefix under which share preview images live.
pub const PREVIEW_PREFIX: &str = "previews/";

/// Key for a tile image.
pub fn tile_blob_key(canvas_id: Uuid, tile_id: Uuid) -> String {
    format!("{TILE_PREFIX}{canvas_id}/{tile_id}.png")
}

/// Key for a canvas share preview image.
pub fn preview_blob_key(canvas_id: Uuid) -> String {
    format!("{PREVIEW_PREFIX}{canvas_id}.png")
}
