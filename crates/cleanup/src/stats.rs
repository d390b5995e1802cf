//! Run statistics and audit record construction.

use crate::error::RunError;
use tessera_metadata::models::AuditRecordRow;
use time::OffsetDateTime;

/// Counters accumulated over one run.
#[derive(Debug, Default, Clone)]
pub(crate) struct RunTotals {
    pub canvases_deleted: u64,
    pub tiles_deleted: u64,
    /// Approximate: counts deleted canvases that had tiles, not the
    /// cascaded layer rows themselves.
    pub layers_deleted: u64,
    pub previews_deleted: u64,
    pub orphan_tiles_deleted: u64,
    pub orphan_tile_blobs_deleted: u64,
    pub orphan_previews_deleted: u64,
    pub bytes_reclaimed: u64,
}

/// Audit record id for a run. Derived from the start timestamp; the run
/// lock already prevents two runs from starting within the same second.
pub(crate) fn audit_id_for(started_at: OffsetDateTime) -> String {
    format!("cleanup-{}", started_at.unix_timestamp())
}

/// Build the immutable audit record for a completed run.
pub(crate) fn build_audit_record(
    started_at: OffsetDateTime,
    totals: &RunTotals,
    total_tiles_before: u64,
    total_tiles_after: u64,
    errors: &[RunError],
    duration_ms: i64,
) -> Result<AuditRecordRow, serde_json::Error> {
    let errors_json = if errors.is_empty() {
        None
    } else {
        Some(serde_json::to_string(errors)?)
    };

    Ok(AuditRecordRow {
        audit_id: audit_id_for(started_at),
        started_at,
        canvases_deleted: totals.canvases_deleted as i64,
        tiles_deleted: totals.tiles_deleted as i64,
        layers_deleted: totals.layers_deleted as i64,
        previews_deleted: totals.previews_deleted as i64,
        orphan_tiles_deleted: totals.orphan_tiles_deleted as i64,
        orphan_tile_blobs_deleted: totals.orphan_tile_blobs_deleted as i64,
        orphan_previews_deleted: totals.orphan_previews_deleted as i64,
        bytes_reclaimed: totals.bytes_reclaimed as i64,
        total_tiles_before: total_tiles_before as i64,
        total_tiles_after: total_tiles_after as i64,
        errors_json,
        duration_ms,
    })
}
