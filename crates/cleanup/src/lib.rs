//! Retention and cross-store garbage collection for Tessera.
//!
//! A cleanup run reclaims storage for abandoned canvases and repairs
//! referential inconsistencies between the metadata store and the blob
//! store:
//!
//! 1. Acquire the singleton run lock (skip the run if another holds it).
//! 2. Capture the global tile count.
//! 3. Scan for canvases past the retention period that are empty or
//!    were never shared, deleting each one (rows, then blobs, then the
//!    canvas row) until the scan is exhausted or the safety cap is hit.
//! 4. Reconcile orphans: dangling tile rows and unreferenced blobs.
//! 5. Capture the tile count again and persist one immutable audit
//!    record.
//! 6. Release the lock, on every exit path after a successful acquire.
//!
//! The deletion loop is strictly sequential; the safety cap is the only
//! internal guard against unbounded runtime. Every per-item failure
//! degrades the run to partial completion and is recorded in the
//! returned error list; only a metadata failure aborts a run outright.

mod executor;
mod lock;
mod orphan;
mod scanner;
mod stats;

pub mod error;

pub use error::{CleanupError, RunError, RunErrorKind};

use scanner::EligibilityScanner;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tessera_core::config::CleanupConfig;
use tessera_metadata::MetadataStore;
use tessera_storage::ObjectStore;
use time::OffsetDateTime;
use uuid::Uuid;

/// Outcome of one cleanup run, returned to the caller.
#[derive(Debug, Serialize)]
pub struct CleanupResult {
    /// Whether the run completed without any per-item errors.
    pub success: bool,
    /// Id of the audit record persisted for this run.
    pub audit_record_id: Option<String>,
    /// Canvases the deletion pass attempted (including failed ones).
    pub containers_processed: u64,
    /// Per-item failures, also serialized into the audit record.
    pub errors: Vec<RunError>,
}

/// Executes cleanup runs. One runner instance per process; the run lock
/// serializes runs across processes.
pub struct CleanupRunner {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn ObjectStore>,
    config: CleanupConfig,
    holder: String,
}

impl CleanupRunner {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn ObjectStore>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            metadata,
            storage,
            config,
            holder: format!("tessera-cleanup-{}", Uuid::new_v4()),
        }
    }

    /// Override the lock holder identity (useful in tests and for
    /// operator-triggered runs that want a recognizable name).
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    /// Execute one cleanup run.
    ///
    /// Returns `Err(CleanupError::LockHeld { .. })` when another run is
    /// active, an expected outcome the caller should log and skip rather
    /// than alert on. Any other error aborted the run before an audit record
    /// was written; the lock is released on every exit path regardless.
    pub async fn execute(&self) -> Result<CleanupResult, CleanupError> {
        let started_at = OffsetDateTime::now_utc();
        let started = Instant::now();

        match lock::acquire(
            &*self.metadata,
            &self.holder,
            self.config.lock_stale_after(),
        )
        .await?
        {
            lock::Acquisition::Acquired => {}
            lock::Acquisition::Held { holder, held_at } => {
                return Err(CleanupError::LockHeld { holder, held_at });
            }
        }
        tracing::info!(holder = %self.holder, "cleanup run started");

        let outcome = self.run_locked(started_at, started).await;

        // Single release point: every path after a successful acquire
        // funnels through here, error or not.
        lock::release(&*self.metadata).await;

        outcome
    }

    async fn run_locked(
        &self,
        started_at: OffsetDateTime,
        started: Instant,
    ) -> Result<CleanupResult, CleanupError> {
        let total_tiles_before = self.metadata.count_tiles().await?;

        let mut totals = stats::RunTotals::default();
        let mut errors: Vec<RunError> = Vec::new();
        let mut containers_processed = 0u64;

        let cutoff = started_at - self.config.retention_period();
        let mut scanner =
            EligibilityScanner::new(&*self.metadata, cutoff, self.config.page_size);

        'scan: loop {
            let page = scanner.next_page().await?;
            if page.is_empty() {
                break;
            }
            for canvas in page {
                if totals.canvases_deleted >= self.config.safety_cap {
                    tracing::warn!(
                        cap = self.config.safety_cap,
                        "safety cap reached; remaining eligible canvases deferred to the next run"
                    );
                    break 'scan;
                }
                containers_processed += 1;
                match executor::delete_canvas(
                    &*self.metadata,
                    &*self.storage,
                    &canvas,
                    &mut errors,
                )
                .await
                {
                    Ok(removal) => {
                        totals.canvases_deleted += 1;
                        totals.tiles_deleted += removal.tiles_deleted;
                        if canvas.tile_count > 0 {
                            // Approximate: counts canvases that had tiles,
                            // not the cascaded layer rows themselves.
                            totals.layers_deleted += 1;
                        }
                        if removal.preview_deleted {
                            totals.previews_deleted += 1;
                        }
                        totals.bytes_reclaimed += removal.bytes_reclaimed;
                        tracing::debug!(
                            canvas_id = %canvas.canvas_id,
                            tiles = removal.tiles_deleted,
                            bytes = removal.bytes_reclaimed,
                            "canvas deleted"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            canvas_id = %canvas.canvas_id,
                            error = %e,
                            "failed to delete canvas; continuing with the next one"
                        );
                        errors.push(RunError::new(
                            RunErrorKind::ContainerDelete,
                            canvas.canvas_id.to_string(),
                            e.to_string(),
                        ));
                    }
                }
            }
        }

        let sweep = orphan::reconcile(&*self.metadata, &*self.storage, &mut errors).await?;
        totals.orphan_tiles_deleted = sweep.orphan_tiles_deleted;
        totals.orphan_tile_blobs_deleted = sweep.orphan_tile_blobs_deleted;
        totals.orphan_previews_deleted = sweep.orphan_previews_deleted;
        totals.bytes_reclaimed += sweep.bytes_reclaimed;

        let total_tiles_after = self.metadata.count_tiles().await?;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let record = stats::build_audit_record(
            started_at,
            &totals,
            total_tiles_before,
            total_tiles_after,
            &errors,
            duration_ms,
        )?;
        self.metadata.insert_audit_record(&record).await?;

        tracing::info!(
            audit_id = %record.audit_id,
            canvases = totals.canvases_deleted,
            tiles = totals.tiles_deleted,
            orphan_tiles = totals.orphan_tiles_deleted,
            orphan_previews = totals.orphan_previews_deleted,
            bytes = totals.bytes_reclaimed,
            errors = errors.len(),
            duration_ms,
            "cleanup run finished"
        );

        Ok(CleanupResult {
            success: errors.is_empty(),
            audit_record_id: Some(record.audit_id),
            containers_processed,
            errors,
        })
    }
}
