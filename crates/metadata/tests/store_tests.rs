//! Integration tests for the SQLite metadata store.

use tempfile::TempDir;
use tessera_metadata::models::{AuditRecordRow, CanvasRow, LayerRow, LockRow, TileRow};
use tessera_metadata::repos::{
    AuditRepo, CanvasCursor, CanvasRepo, LayerRepo, LockRepo, TileRepo,
};
use tessera_metadata::{MetadataStore, SqliteStore};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

async fn store() -> (SqliteStore, TempDir) {
    let temp = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(temp.path().join("metadata.db"))
        .await
        .unwrap();
    (store, temp)
}

fn canvas(age_days: i64, tile_count: i64, shared: bool) -> CanvasRow {
    let canvas_id = Uuid::new_v4();
    CanvasRow {
        canvas_id,
        created_at: OffsetDateTime::now_utc() - Duration::days(age_days),
        tile_count,
        share_lat: shared.then_some(35.0),
        share_lng: shared.then_some(139.7),
        share_zoom: shared.then_some(12),
        preview_blob_key: shared.then(|| format!("previews/{canvas_id}.png")),
    }
}

fn tile(canvas_id: Uuid) -> TileRow {
    let tile_id = Uuid::new_v4();
    TileRow {
        tile_id,
        canvas_id,
        blob_key: format!("tiles/{canvas_id}/{tile_id}.png"),
        updated_at: OffsetDateTime::now_utc(),
    }
}

#[tokio::test]
async fn canvas_roundtrip() {
    let (store, _tmp) = store().await;
    let row = canvas(10, 3, true);
    store.create_canvas(&row).await.unwrap();

    let fetched = store.get_canvas(row.canvas_id).await.unwrap().unwrap();
    assert_eq!(fetched.tile_count, 3);
    assert!(fetched.is_shared());
    assert_eq!(fetched.preview_blob_key, row.preview_blob_key);

    assert_eq!(store.delete_canvas(row.canvas_id).await.unwrap(), 1);
    assert!(store.get_canvas(row.canvas_id).await.unwrap().is_none());
    // Idempotent: already gone.
    assert_eq!(store.delete_canvas(row.canvas_id).await.unwrap(), 0);
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("metadata.db");
    let first = SqliteStore::new(&path).await.unwrap();
    first.create_canvas(&canvas(1, 0, false)).await.unwrap();
    drop(first);

    // Reopening applies the schema again without clobbering data.
    let second = SqliteStore::new(&path).await.unwrap();
    second.health_check().await.unwrap();
    assert_eq!(second.count_canvases().await.unwrap(), 1);
}

#[tokio::test]
async fn eligibility_selects_old_inactive_canvases_only() {
    let (store, _tmp) = store().await;
    let cutoff = OffsetDateTime::now_utc() - Duration::days(30);

    let old_empty = canvas(31, 0, false);
    let old_shared_empty = canvas(31, 0, true);
    let old_unshared_with_tiles = canvas(31, 4, false);
    let old_shared_with_tiles = canvas(31, 4, true);
    let young_empty = canvas(29, 0, false);
    for row in [
        &old_empty,
        &old_shared_empty,
        &old_unshared_with_tiles,
        &old_shared_with_tiles,
        &young_empty,
    ] {
        store.create_canvas(row).await.unwrap();
    }

    let eligible = store
        .list_expired_canvases(cutoff, None, 100)
        .await
        .unwrap();
    let ids: Vec<Uuid> = eligible.iter().map(|c| c.canvas_id).collect();

    // Empty OR unshared, and old enough.
    assert!(ids.contains(&old_empty.canvas_id));
    assert!(ids.contains(&old_shared_empty.canvas_id));
    assert!(ids.contains(&old_unshared_with_tiles.canvas_id));
    // Shared and non-empty is never eligible; 29 days is too young.
    assert!(!ids.contains(&old_shared_with_tiles.canvas_id));
    assert!(!ids.contains(&young_empty.canvas_id));
}

#[tokio::test]
async fn eligibility_pages_with_keyset_cursor() {
    let (store, _tmp) = store().await;
    let cutoff = OffsetDateTime::now_utc() - Duration::days(30);
    for i in 0..5 {
        store.create_canvas(&canvas(40 + i, 0, false)).await.unwrap();
    }

    let first = store.list_expired_canvases(cutoff, None, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    let cursor = CanvasCursor::from(first.last().unwrap());

    let second = store
        .list_expired_canvases(cutoff, Some(cursor), 100)
        .await
        .unwrap();
    assert_eq!(second.len(), 3);

    // Pages never overlap.
    for row in &second {
        assert!(first.iter().all(|f| f.canvas_id != row.canvas_id));
    }
}

#[tokio::test]
async fn cursor_survives_deletions_behind_it() {
    let (store, _tmp) = store().await;
    let cutoff = OffsetDateTime::now_utc() - Duration::days(30);
    for i in 0..6 {
        store.create_canvas(&canvas(40 + i, 0, false)).await.unwrap();
    }

    let first = store.list_expired_canvases(cutoff, None, 3).await.unwrap();
    let cursor = CanvasCursor::from(first.last().unwrap());
    // Delete the first page, as a cleanup run would.
    for row in &first {
        store.delete_canvas(row.canvas_id).await.unwrap();
    }

    // The remaining rows are all still visible past the cursor.
    let second = store
        .list_expired_canvases(cutoff, Some(cursor), 100)
        .await
        .unwrap();
    assert_eq!(second.len(), 3);
}

#[tokio::test]
async fn tile_queries_and_single_statement_deletes() {
    let (store, _tmp) = store().await;
    let owner = canvas(31, 2, false);
    store.create_canvas(&owner).await.unwrap();
    let a = tile(owner.canvas_id);
    let b = tile(owner.canvas_id);
    store.create_tile(&a).await.unwrap();
    store.create_tile(&b).await.unwrap();

    assert_eq!(store.count_tiles().await.unwrap(), 2);
    assert_eq!(
        store
            .list_tiles_for_canvas(owner.canvas_id)
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(store.tile_key_referenced(&a.blob_key).await.unwrap());
    assert!(!store.tile_key_referenced("tiles/nope.png").await.unwrap());

    assert_eq!(
        store.delete_tiles_for_canvas(owner.canvas_id).await.unwrap(),
        2
    );
    assert_eq!(store.count_tiles().await.unwrap(), 0);
}

#[tokio::test]
async fn orphan_tiles_are_found_and_deleted() {
    let (store, _tmp) = store().await;
    let live = canvas(1, 1, false);
    store.create_canvas(&live).await.unwrap();
    let live_tile = tile(live.canvas_id);
    store.create_tile(&live_tile).await.unwrap();

    // Parent canvas never existed: an out-of-band removal.
    let dangling = tile(Uuid::new_v4());
    store.create_tile(&dangling).await.unwrap();

    let orphans = store.list_orphan_tiles().await.unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].tile_id, dangling.tile_id);

    assert_eq!(store.delete_orphan_tiles().await.unwrap(), 1);
    assert!(store.get_tile(dangling.tile_id).await.unwrap().is_none());
    // The live tile is untouched.
    assert!(store.get_tile(live_tile.tile_id).await.unwrap().is_some());
}

#[tokio::test]
async fn layers_cascade_with_their_canvas() {
    let (store, _tmp) = store().await;
    let owner = canvas(1, 0, false);
    store.create_canvas(&owner).await.unwrap();
    for z in 0..3 {
        store
            .create_layer(&LayerRow {
                layer_id: Uuid::new_v4(),
                canvas_id: owner.canvas_id,
                layer_name: format!("layer-{z}"),
                z_index: z,
                created_at: OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();
    }
    assert_eq!(store.count_layers().await.unwrap(), 3);

    // Listed in stacking order.
    let layers = store.list_layers_for_canvas(owner.canvas_id).await.unwrap();
    assert_eq!(layers.len(), 3);
    assert!(layers.windows(2).all(|w| w[0].z_index <= w[1].z_index));

    store.delete_canvas(owner.canvas_id).await.unwrap();
    assert_eq!(store.count_layers().await.unwrap(), 0);
    assert!(
        store
            .list_layers_for_canvas(owner.canvas_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn lock_insert_is_exclusive() {
    let (store, _tmp) = store().await;
    let first = LockRow {
        lock_id: 1,
        holder: "runner-a".to_string(),
        held_at: OffsetDateTime::now_utc(),
    };
    let second = LockRow {
        lock_id: 1,
        holder: "runner-b".to_string(),
        held_at: OffsetDateTime::now_utc(),
    };

    assert!(store.try_insert_lock(&first).await.unwrap());
    assert!(!store.try_insert_lock(&second).await.unwrap());

    let held = store.get_lock().await.unwrap().unwrap();
    assert_eq!(held.holder, "runner-a");

    store.delete_lock().await.unwrap();
    // Idempotent.
    store.delete_lock().await.unwrap();
    assert!(store.try_insert_lock(&second).await.unwrap());
}

#[tokio::test]
async fn audit_records_persist_and_list_newest_first() {
    let (store, _tmp) = store().await;
    let base = OffsetDateTime::now_utc() - Duration::hours(2);
    for i in 0..3i64 {
        let started_at = base + Duration::hours(i);
        store
            .insert_audit_record(&AuditRecordRow {
                audit_id: format!("cleanup-{}", started_at.unix_timestamp()),
                started_at,
                canvases_deleted: i,
                tiles_deleted: 0,
                layers_deleted: 0,
                previews_deleted: 0,
                orphan_tiles_deleted: 0,
                orphan_tile_blobs_deleted: 0,
                orphan_previews_deleted: 0,
                bytes_reclaimed: 0,
                total_tiles_before: 10,
                total_tiles_after: 10,
                errors_json: None,
                duration_ms: 5,
            })
            .await
            .unwrap();
    }

    let recent = store.list_recent_audit_records(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].canvases_deleted, 2);
    assert_eq!(recent[1].canvases_deleted, 1);

    let fetched = store
        .get_audit_record(&recent[0].audit_id)
        .await
        .unwrap()
        .unwrap();
    assert!(fetched.errors_json.is_none());
}
