//! Layer repository.

use crate::error::MetadataResult;
use crate::models::LayerRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for layer rows. The cleanup engine never touches layers
/// directly; they are removed by foreign-key cascade when their canvas
/// row is deleted.
#[async_trait]
pub trait LayerRepo: Send + Sync {
    /// Create a layer. Used by the application and by test fixtures.
    async fn create_layer(&self, layer: &LayerRow) -> MetadataResult<()>;

    /// All layers belonging to a canvas.
    async fn list_layers_for_canvas(&self, canvas_id: Uuid) -> MetadataResult<Vec<LayerRow>>;

    /// Total number of layer rows.
    async fn count_layers(&self) -> MetadataResult<u64>;
}
