//! Per-canvas deletion.

use crate::error::{RunError, RunErrorKind};
use tessera_metadata::models::CanvasRow;
use tessera_metadata::{MetadataResult, MetadataStore};
use tessera_storage::{ObjectStore, StorageError, StorageResult};

/// What one canvas deletion freed.
#[derive(Debug, Default)]
pub(crate) struct CanvasRemoval {
    pub tiles_deleted: u64,
    pub preview_deleted: bool,
    pub bytes_reclaimed: u64,
}

/// Delete one canvas: its tile rows, their blobs, its preview blob, and
/// finally the canvas row itself (cascading layer rows).
///
/// Metadata rows go before blobs, and the canvas row goes last. A
/// mid-sequence failure leaves either orphaned blobs (healed by the
/// next run's reconciliation pass) or an empty canvas row (still
/// eligible, retried by a later run), never a row pointing at deleted
/// metadata the application could trip over.
///
/// Blob failures are recorded in `errors` and do not stop the sequence;
/// a metadata failure aborts this canvas and is handled by the caller.
pub(crate) async fn delete_canvas(
    metadata: &dyn MetadataStore,
    storage: &dyn ObjectStore,
    canvas: &CanvasRow,
    errors: &mut Vec<RunError>,
) -> MetadataResult<CanvasRemoval> {
    let mut removal = CanvasRemoval::default();

    let tiles = metadata.list_tiles_for_canvas(canvas.canvas_id).await?;
    removal.tiles_deleted = metadata.delete_tiles_for_canvas(canvas.canvas_id).await?;

    for tile in &tiles {
        match remove_blob(storage, &tile.blob_key).await {
            Ok(freed) => removal.bytes_reclaimed += freed,
            Err(e) => {
                tracing::warn!(
                    canvas_id = %canvas.canvas_id,
                    blob_key = %tile.blob_key,
                    error = %e,
                    "failed to delete tile blob; left for orphan reconciliation"
                );
                errors.push(RunError::new(
                    RunErrorKind::TileBlobDelete,
                    tile.blob_key.clone(),
                    e.to_string(),
                ));
            }
        }
    }

    if let Some(key) = &canvas.preview_blob_key {
        match remove_blob(storage, key).await {
            Ok(freed) => {
                removal.bytes_reclaimed += freed;
                removal.preview_deleted = true;
            }
            Err(e) => {
                tracing::warn!(
                    canvas_id = %canvas.canvas_id,
                    blob_key = %key,
                    error = %e,
                    "failed to delete preview blob; left for orphan reconciliation"
                );
                errors.push(RunError::new(
                    RunErrorKind::PreviewBlobDelete,
                    key.clone(),
                    e.to_string(),
                ));
            }
        }
    }

    metadata.delete_canvas(canvas.canvas_id).await?;
    Ok(removal)
}

/// Size then delete one blob, tolerating objects that are already gone.
/// Returns the bytes freed (0 if the object was absent).
pub(crate) async fn remove_blob(storage: &dyn ObjectStore, key: &str) -> StorageResult<u64> {
    let size = match storage.head(key).await {
        Ok(meta) => meta.size,
        Err(StorageError::NotFound(_)) => return Ok(0),
        Err(e) => return Err(e),
    };
    delete_with_retry(storage, key).await?;
    Ok(size)
}

/// Delete a blob with exactly one immediate retry. No backoff and no
/// queueing: a blob that fails twice stays put and is picked up as an
/// orphan by a later run.
pub(crate) async fn delete_with_retry(storage: &dyn ObjectStore, key: &str) -> StorageResult<()> {
    match storage.delete(key).await {
        Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
        Err(first) => {
            tracing::debug!(key = %key, error = %first, "blob delete failed, retrying once");
            match storage.delete(key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
                Err(second) => Err(second),
            }
        }
    }
}
