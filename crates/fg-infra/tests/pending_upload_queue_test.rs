//! Durability of the offline upload queue across process restarts.

use std::collections::BTreeMap;

use fg_core::ports::PendingUploadQueuePort;
use fg_core::upload::NewPendingUpload;
use fg_infra::db::executor::DieselSqliteExecutor;
use fg_infra::db::pool::init_db_pool;
use fg_infra::DieselPendingUploadQueue;
use tempfile::TempDir;

fn jpeg_upload(size: usize) -> NewPendingUpload {
    let mut payload = vec![0u8; size];
    payload[..3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
    NewPendingUpload {
        payload,
        file_name: "cover.jpg".to_string(),
        mime_type: "image/jpeg".to_string(),
        folder: "covers".to_string(),
        headers_snapshot: BTreeMap::new(),
        created_at_ms: 1_700_000_000_000,
    }
}

#[tokio::test]
async fn queued_upload_survives_reopen_byte_for_byte() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queue.db");
    let db_url = db_path.to_string_lossy().to_string();
    let upload = jpeg_upload(2 * 1024 * 1024);

    let id = {
        let pool = init_db_pool(&db_url).unwrap();
        let queue = DieselPendingUploadQueue::new(DieselSqliteExecutor::new(pool));
        queue.enqueue(upload.clone()).await.unwrap()
    };

    let pool = init_db_pool(&db_url).unwrap();
    let queue = DieselPendingUploadQueue::new(DieselSqliteExecutor::new(pool));
    let pending = queue.list_pending().await.unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].payload.len(), upload.payload.len());
    assert_eq!(pending[0].payload, upload.payload);
    assert_eq!(pending[0].mime_type, "image/jpeg");
    assert_eq!(pending[0].folder, "covers");
}

#[tokio::test]
async fn ids_are_not_reused_after_removal() {
    let dir = TempDir::new().unwrap();
    let db_url = dir.path().join("queue.db").to_string_lossy().to_string();
    let pool = init_db_pool(&db_url).unwrap();
    let queue = DieselPendingUploadQueue::new(DieselSqliteExecutor::new(pool));

    let first = queue.enqueue(jpeg_upload(16)).await.unwrap();
    assert!(queue.remove(first).await.unwrap());
    let second = queue.enqueue(jpeg_upload(16)).await.unwrap();

    assert!(second > first);
}
