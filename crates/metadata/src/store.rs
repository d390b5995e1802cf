//! Metadata store trait and SQLite implementation.

use crate::error::MetadataResult;
use crate::repos::{AuditRepo, CanvasRepo, LayerRepo, LockRepo, TileRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    CanvasRepo + TileRepo + LayerRepo + LockRepo + AuditRepo + Send + Sync
{
    /// Apply the schema idempotently.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) a SQLite store and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// SQL fragment shared by the eligibility queries: inactive (empty or
// never shared) and past the retention cutoff.
const ELIGIBLE_PREDICATE: &str = "(tile_count = 0 \
     OR (share_lat IS NULL AND share_lng IS NULL AND share_zoom IS NULL)) \
     AND created_at <= ?";

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::CanvasCursor;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl CanvasRepo for SqliteStore {
        async fn create_canvas(&self, canvas: &CanvasRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO canvases (canvas_id, created_at, tile_count, share_lat, share_lng, share_zoom, preview_blob_key) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(canvas.canvas_id)
            .bind(canvas.created_at)
            .bind(canvas.tile_count)
            .bind(canvas.share_lat)
            .bind(canvas.share_lng)
            .bind(canvas.share_zoom)
            .bind(&canvas.preview_blob_key)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_canvas(&self, canvas_id: Uuid) -> MetadataResult<Option<CanvasRow>> {
            let row =
                sqlx::query_as::<_, CanvasRow>("SELECT * FROM canvases WHERE canvas_id = ?")
                    .bind(canvas_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn list_expired_canvases(
            &self,
            cutoff: OffsetDateTime,
            cursor: Option<CanvasCursor>,
            limit: u32,
        ) -> MetadataResult<Vec<CanvasRow>> {
            let rows = match cursor {
                None => {
                    let sql = format!(
                        "SELECT * FROM canvases WHERE {ELIGIBLE_PREDICATE} \
                         ORDER BY created_at, canvas_id LIMIT ?"
                    );
                    sqlx::query_as::<_, CanvasRow>(&sql)
                        .bind(cutoff)
                        .bind(limit)
                        .fetch_all(&self.pool)
                        .await?
                }
                Some(cursor) => {
                    let sql = format!(
                        "SELECT * FROM canvases WHERE {ELIGIBLE_PREDICATE} \
                         AND (created_at > ? OR (created_at = ? AND canvas_id > ?)) \
                         ORDER BY created_at, canvas_id LIMIT ?"
                    );
                    sqlx::query_as::<_, CanvasRow>(&sql)
                        .bind(cutoff)
                        .bind(cursor.created_at)
                        .bind(cursor.created_at)
                        .bind(cursor.canvas_id)
                        .bind(limit)
                        .fetch_all(&self.pool)
                        .await?
                }
            };
            Ok(rows)
        }

        async fn delete_canvas(&self, canvas_id: Uuid) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM canvases WHERE canvas_id = ?")
                .bind(canvas_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }

        async fn count_canvases(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM canvases")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn preview_key_referenced(&self, key: &str) -> MetadataResult<bool> {
            let referenced: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM canvases WHERE preview_blob_key = ?)",
            )
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
            Ok(referenced)
        }
    }

    #[async_trait]
    impl TileRepo for SqliteStore {
        async fn create_tile(&self, tile: &TileRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO tiles (tile_id, canvas_id, blob_key, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(tile.tile_id)
            .bind(tile.canvas_id)
            .bind(&tile.blob_key)
            .bind(tile.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_tile(&self, tile_id: Uuid) -> MetadataResult<Option<TileRow>> {
            let row = sqlx::query_as::<_, TileRow>("SELECT * FROM tiles WHERE tile_id = ?")
                .bind(tile_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_tiles_for_canvas(&self, canvas_id: Uuid) -> MetadataResult<Vec<TileRow>> {
            let rows = sqlx::query_as::<_, TileRow>(
                "SELECT * FROM tiles WHERE canvas_id = ? ORDER BY tile_id",
            )
            .bind(canvas_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_tiles_for_canvas(&self, canvas_id: Uuid) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM tiles WHERE canvas_id = ?")
                .bind(canvas_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }

        async fn list_orphan_tiles(&self) -> MetadataResult<Vec<TileRow>> {
            let rows = sqlx::query_as::<_, TileRow>(
                "SELECT t.* FROM tiles t \
                 LEFT JOIN canvases c ON t.canvas_id = c.canvas_id \
                 WHERE c.canvas_id IS NULL \
                 ORDER BY t.tile_id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn delete_orphan_tiles(&self) -> MetadataResult<u64> {
            let result = sqlx::query(
                "DELETE FROM tiles WHERE canvas_id NOT IN (SELECT canvas_id FROM canvases)",
            )
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }

        async fn count_tiles(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tiles")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }

        async fn tile_key_referenced(&self, key: &str) -> MetadataResult<bool> {
            let referenced: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tiles WHERE blob_key = ?)")
                    .bind(key)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(referenced)
        }
    }

    #[async_trait]
    impl LayerRepo for SqliteStore {
        async fn create_layer(&self, layer: &LayerRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO layers (layer_id, canvas_id, layer_name, z_index, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(layer.layer_id)
            .bind(layer.canvas_id)
            .bind(&layer.layer_name)
            .bind(layer.z_index)
            .bind(layer.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn list_layers_for_canvas(&self, canvas_id: Uuid) -> MetadataResult<Vec<LayerRow>> {
            let rows = sqlx::query_as::<_, LayerRow>(
                "SELECT * FROM layers WHERE canvas_id = ? ORDER BY z_index",
            )
            .bind(canvas_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_layers(&self) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM layers")
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }

    #[async_trait]
    impl LockRepo for SqliteStore {
        async fn try_insert_lock(&self, lock: &LockRow) -> MetadataResult<bool> {
            // INSERT OR IGNORE against the constrained primary key makes
            // the winner of two concurrent inserts unambiguous.
            let result = sqlx::query(
                "INSERT OR IGNORE INTO cleanup_lock (lock_id, holder, held_at) VALUES (1, ?, ?)",
            )
            .bind(&lock.holder)
            .bind(lock.held_at)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() == 1)
        }

        async fn get_lock(&self) -> MetadataResult<Option<LockRow>> {
            let row =
                sqlx::query_as::<_, LockRow>("SELECT * FROM cleanup_lock WHERE lock_id = 1")
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn delete_lock(&self) -> MetadataResult<()> {
            sqlx::query("DELETE FROM cleanup_lock WHERE lock_id = 1")
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl AuditRepo for SqliteStore {
        async fn insert_audit_record(&self, record: &AuditRecordRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO cleanup_audit (\
                     audit_id, started_at, canvases_deleted, tiles_deleted, layers_deleted, \
                     previews_deleted, orphan_tiles_deleted, orphan_tile_blobs_deleted, \
                     orphan_previews_deleted, bytes_reclaimed, total_tiles_before, \
                     total_tiles_after, errors_json, duration_ms\
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.audit_id)
            .bind(record.started_at)
            .bind(record.canvases_deleted)
            .bind(record.tiles_deleted)
            .bind(record.layers_deleted)
            .bind(record.previews_deleted)
            .bind(record.orphan_tiles_deleted)
            .bind(record.orphan_tile_blobs_deleted)
            .bind(record.orphan_previews_deleted)
            .bind(record.bytes_reclaimed)
            .bind(record.total_tiles_before)
            .bind(record.total_tiles_after)
            .bind(&record.errors_json)
            .bind(record.duration_ms)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_audit_record(
            &self,
            audit_id: &str,
        ) -> MetadataResult<Option<AuditRecordRow>> {
            let row = sqlx::query_as::<_, AuditRecordRow>(
                "SELECT * FROM cleanup_audit WHERE audit_id = ?",
            )
            .bind(audit_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_recent_audit_records(
            &self,
            limit: u32,
        ) -> MetadataResult<Vec<AuditRecordRow>> {
            let rows = sqlx::query_as::<_, AuditRecordRow>(
                "SELECT * FROM cleanup_audit ORDER BY started_at DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Canvases: top-level content units, created and mutated by the app.
CREATE TABLE IF NOT EXISTS canvases (
    canvas_id BLOB PRIMARY KEY,
    created_at TEXT NOT NULL,
    tile_count INTEGER NOT NULL DEFAULT 0,
    share_lat REAL,
    share_lng REAL,
    share_zoom INTEGER,
    preview_blob_key TEXT
);
CREATE INDEX IF NOT EXISTS idx_canvases_created ON canvases(created_at, canvas_id);

-- Tiles: canvas_id is app-managed, deliberately not a declared foreign
-- key, so out-of-band canvas removal leaves reconcilable orphans rather
-- than failing writes.
CREATE TABLE IF NOT EXISTS tiles (
    tile_id BLOB PRIMARY KEY,
    canvas_id BLOB NOT NULL,
    blob_key TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tiles_canvas ON tiles(canvas_id);
CREATE INDEX IF NOT EXISTS idx_tiles_blob_key ON tiles(blob_key);

-- Layers cascade with their canvas row.
CREATE TABLE IF NOT EXISTS layers (
    layer_id BLOB PRIMARY KEY,
    canvas_id BLOB NOT NULL REFERENCES canvases(canvas_id) ON DELETE CASCADE,
    layer_name TEXT NOT NULL,
    z_index INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_layers_canvas ON layers(canvas_id);

-- Singleton cleanup run lock.
CREATE TABLE IF NOT EXISTS cleanup_lock (
    lock_id INTEGER PRIMARY KEY CHECK (lock_id = 1),
    holder TEXT NOT NULL,
    held_at TEXT NOT NULL
);

-- Append-only audit trail, one row per cleanup run.
CREATE TABLE IF NOT EXISTS cleanup_audit (
    audit_id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    canvases_deleted INTEGER NOT NULL,
    tiles_deleted INTEGER NOT NULL,
    layers_deleted INTEGER NOT NULL,
    previews_deleted INTEGER NOT NULL,
    orphan_tiles_deleted INTEGER NOT NULL,
    orphan_tile_blobs_deleted INTEGER NOT NULL,
    orphan_previews_deleted INTEGER NOT NULL,
    bytes_reclaimed INTEGER NOT NULL,
    total_tiles_before INTEGER NOT NULL,
    total_tiles_after INTEGER NOT NULL,
    errors_json TEXT,
    duration_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cleanup_audit_started ON cleanup_audit(started_at);
"#;
