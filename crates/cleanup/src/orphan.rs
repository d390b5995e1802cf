//! Orphan reconciliation.
//!
//! Repairs the two referential inconsistencies that can accumulate
//! between the metadata store and the blob store:
//!
//! - Class A: tile rows whose canvas no longer exists (out-of-band
//!   canvas removal, or a crash between tile and canvas deletion).
//! - Class B: blobs in the `previews/` and `tiles/` namespaces that no
//!   live row references (earlier blob-delete failures, or a crash
//!   after row deletion).
//!
//! Runs after the primary deletion pass so blobs freed there are
//! already gone from the listings and are not re-counted.

use crate::error::{RunError, RunErrorKind};
use crate::executor::{delete_with_retry, remove_blob};
use tessera_core::keys::{PREVIEW_PREFIX, TILE_PREFIX};
use tessera_metadata::MetadataStore;
use tessera_storage::ObjectStore;

/// Counters from one reconciliation pass.
#[derive(Debug, Default)]
pub(crate) struct OrphanSweep {
    /// Class A rows removed.
    pub orphan_tiles_deleted: u64,
    /// Blobs removed for orphaned tiles (Class A rows and the Class B
    /// `tiles/` sweep).
    pub orphan_tile_blobs_deleted: u64,
    /// Unreferenced `previews/` blobs removed.
    pub orphan_previews_deleted: u64,
    pub bytes_reclaimed: u64,
}

pub(crate) async fn reconcile(
    metadata: &dyn MetadataStore,
    storage: &dyn ObjectStore,
    errors: &mut Vec<RunError>,
) -> Result<OrphanSweep, crate::error::CleanupError> {
    let mut sweep = OrphanSweep::default();

    // Class A: capture the rows first for their blob keys, then delete
    // them in one statement.
    let orphan_tiles = metadata.list_orphan_tiles().await?;
    if !orphan_tiles.is_empty() {
        sweep.orphan_tiles_deleted = metadata.delete_orphan_tiles().await?;
        tracing::info!(
            rows = sweep.orphan_tiles_deleted,
            "removed tile rows whose canvas no longer exists"
        );
        for tile in &orphan_tiles {
            match remove_blob(storage, &tile.blob_key).await {
                Ok(freed) => {
                    sweep.orphan_tile_blobs_deleted += 1;
                    sweep.bytes_reclaimed += freed;
                }
                Err(e) => {
                    tracing::warn!(
                        tile_id = %tile.tile_id,
                        blob_key = %tile.blob_key,
                        error = %e,
                        "failed to delete orphaned tile blob"
                    );
                    errors.push(RunError::new(
                        RunErrorKind::OrphanBlobDelete,
                        tile.blob_key.clone(),
                        e.to_string(),
                    ));
                }
            }
        }
    }

    // Class B: sweep both namespaces for unreferenced keys. A canvas
    // created concurrently mid-scan is a benign race: its blobs are
    // found referenced and skipped.
    for meta in storage.list(PREVIEW_PREFIX).await? {
        if metadata.preview_key_referenced(&meta.key).await? {
            continue;
        }
        match delete_with_retry(storage, &meta.key).await {
            Ok(()) => {
                sweep.orphan_previews_deleted += 1;
                sweep.bytes_reclaimed += meta.size;
                tracing::debug!(key = %meta.key, "deleted unreferenced preview blob");
            }
            Err(e) => {
                tracing::warn!(key = %meta.key, error = %e, "failed to delete orphaned preview blob");
                errors.push(RunError::new(
                    RunErrorKind::OrphanBlobDelete,
                    meta.key.clone(),
                    e.to_string(),
                ));
            }
        }
    }

    for meta in storage.list(TILE_PREFIX).await? {
        if metadata.tile_key_referenced(&meta.key).await? {
            continue;
        }
        match delete_with_retry(storage, &meta.key).await {
            Ok(()) => {
                sweep.orphan_tile_blobs_deleted += 1;
                sweep.bytes_reclaimed += meta.size;
                tracing::debug!(key = %meta.key, "deleted unreferenced tile blob");
            }
            Err(e) => {
                tracing::warn!(key = %meta.key, error = %e, "failed to delete orphaned tile blob");
                errors.push(RunError::new(
                    RunErrorKind::OrphanBlobDelete,
                    meta.key.clone(),
                    e.to_string(),
                ));
            }
        }
    }

    Ok(sweep)
}
