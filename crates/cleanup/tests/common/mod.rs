//! Shared fixtures for cleanup integration tests: a temporary SQLite
//! store and filesystem blob store, canvas/tile builders that stage
//! both the row and the blob, and a delete-failure-injecting store
//! wrapper for exercising the retry and degradation paths.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;
use tessera_cleanup::CleanupRunner;
use tessera_core::config::CleanupConfig;
use tessera_core::keys;
use tessera_metadata::SqliteStore;
use tessera_metadata::models::{AuditRecordRow, CanvasRow, TileRow};
use tessera_metadata::repos::{AuditRepo, CanvasRepo, TileRepo};
use tessera_storage::{FilesystemBackend, ObjectMeta, ObjectStore, StorageResult};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub const BLOB_BYTES: &[u8] = b"png-bytes";

pub struct TestEnv {
    pub metadata: Arc<SqliteStore>,
    pub storage: Arc<FilesystemBackend>,
    _tmp: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let metadata = Arc::new(
            SqliteStore::new(tmp.path().join("metadata.db"))
                .await
                .unwrap(),
        );
        let storage = Arc::new(
            FilesystemBackend::new(tmp.path().join("blobs"))
                .await
                .unwrap(),
        );
        Self {
            metadata,
            storage,
            _tmp: tmp,
        }
    }

    pub fn runner(&self) -> CleanupRunner {
        self.runner_with(CleanupConfig::default())
    }

    pub fn runner_with(&self, config: CleanupConfig) -> CleanupRunner {
        CleanupRunner::new(self.metadata.clone(), self.storage.clone(), config)
            .with_holder("test-runner")
    }

    /// Runner over a substitute blob store (shares this env's metadata).
    pub fn runner_on(&self, storage: Arc<dyn ObjectStore>) -> CleanupRunner {
        CleanupRunner::new(self.metadata.clone(), storage, CleanupConfig::default())
            .with_holder("test-runner")
    }

    /// Insert a canvas row; a shared canvas also gets its preview blob
    /// staged in the store.
    pub async fn insert_canvas(&self, age_days: i64, tile_count: i64, shared: bool) -> CanvasRow {
        let canvas_id = Uuid::new_v4();
        let preview_blob_key = shared.then(|| keys::preview_blob_key(canvas_id));
        let row = CanvasRow {
            canvas_id,
            created_at: OffsetDateTime::now_utc() - Duration::days(age_days),
            tile_count,
            share_lat: shared.then_some(35.0),
            share_lng: shared.then_some(139.7),
            share_zoom: shared.then_some(12),
            preview_blob_key: preview_blob_key.clone(),
        };
        self.metadata.create_canvas(&row).await.unwrap();
        if let Some(key) = &preview_blob_key {
            self.put_blob(key).await;
        }
        row
    }

    /// Insert a tile row for a canvas and stage its blob.
    pub async fn insert_tile(&self, canvas_id: Uuid) -> TileRow {
        let tile_id = Uuid::new_v4();
        let row = TileRow {
            tile_id,
            canvas_id,
            blob_key: keys::tile_blob_key(canvas_id, tile_id),
            updated_at: OffsetDateTime::now_utc(),
        };
        self.metadata.create_tile(&row).await.unwrap();
        self.put_blob(&row.blob_key).await;
        row
    }

    pub async fn put_blob(&self, key: &str) {
        self.storage
            .put(key, Bytes::from_static(BLOB_BYTES))
            .await
            .unwrap();
    }

    pub async fn blob_exists(&self, key: &str) -> bool {
        self.storage.exists(key).await.unwrap()
    }

    pub async fn latest_audit(&self) -> AuditRecordRow {
        self.metadata
            .list_recent_audit_records(1)
            .await
            .unwrap()
            .into_iter()
            .next()
            .expect("no audit record written")
    }
}

/// Blob store wrapper that fails the next `failures` delete calls with
/// an I/O error, then delegates. Reads always delegate.
pub struct FlakyDeleteStore {
    inner: Arc<dyn ObjectStore>,
    failures: AtomicU32,
}

impl FlakyDeleteStore {
    pub fn new(inner: Arc<dyn ObjectStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyDeleteStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let armed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(std::io::Error::other("injected delete failure").into());
        }
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectMeta>> {
        self.inner.list(prefix).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
