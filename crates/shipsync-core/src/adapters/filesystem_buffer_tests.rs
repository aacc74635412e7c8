//! Tests for the filesystem payload buffer

use super::*;
use crate::buffer::FailureKind;
use tempfile::TempDir;

async fn buffer_in(dir: &TempDir) -> FilesystemPayloadBuffer {
    FilesystemPayloadBuffer::new(dir.path().to_path_buf())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_new_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("staging").join("payloads");

    FilesystemPayloadBuffer::new(nested.clone()).await.unwrap();

    assert!(nested.is_dir());
}

#[tokio::test]
async fn test_put_then_get_round_trips() {
    let dir = TempDir::new().unwrap();
    let buffer = buffer_in(&dir).await;

    let staged = BufferedPayload::new(serde_json::json!({"Shipment": {"AWB": "WB100"}}));
    buffer.put(&staged).await.unwrap();

    let fetched = buffer.get(&staged.payload_id).await.unwrap().unwrap();
    assert_eq!(fetched.payload_id, staged.payload_id);
    assert_eq!(fetched.body, staged.body);
}

#[tokio::test]
async fn test_get_absent_id_is_none() {
    let dir = TempDir::new().unwrap();
    let buffer = buffer_in(&dir).await;

    assert!(buffer.get(&PayloadId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_put_leaves_no_temp_file_behind() {
    let dir = TempDir::new().unwrap();
    let buffer = buffer_in(&dir).await;

    let staged = BufferedPayload::new(serde_json::json!({}));
    buffer.put(&staged).await.unwrap();

    let mut names = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    names.sort();

    assert_eq!(names, vec![format!("{}.json", staged.payload_id)]);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let buffer = buffer_in(&dir).await;

    let staged = BufferedPayload::new(serde_json::json!({}));
    buffer.put(&staged).await.unwrap();

    buffer.delete(&staged.payload_id).await.unwrap();
    buffer.delete(&staged.payload_id).await.unwrap();

    assert!(buffer.get(&staged.payload_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_ids_skips_foreign_files() {
    let dir = TempDir::new().unwrap();
    let buffer = buffer_in(&dir).await;

    let staged = BufferedPayload::new(serde_json::json!({}));
    buffer.put(&staged).await.unwrap();

    // Unrelated files under the directory are not buffer entries.
    std::fs::write(dir.path().join("README.txt"), "notes").unwrap();
    std::fs::write(dir.path().join("not-a-ulid.json"), "{}").unwrap();

    let ids = buffer.list_ids().await.unwrap();
    assert_eq!(ids, vec![staged.payload_id]);
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();

    let staged = BufferedPayload::new(serde_json::json!({"n": 1}))
        .with_failure(FailureKind::StoreUnavailable);
    {
        let buffer = buffer_in(&dir).await;
        buffer.put(&staged).await.unwrap();
    }

    let reopened = buffer_in(&dir).await;
    let fetched = reopened.get(&staged.payload_id).await.unwrap().unwrap();

    assert_eq!(fetched.attempts, 1);
    assert_eq!(fetched.last_failure, Some(FailureKind::StoreUnavailable));
}

#[tokio::test]
async fn test_get_corrupt_entry_is_error() {
    let dir = TempDir::new().unwrap();
    let buffer = buffer_in(&dir).await;

    let id = PayloadId::new();
    std::fs::write(dir.path().join(format!("{}.json", id)), "not json").unwrap();

    let err = buffer.get(&id).await.unwrap_err();
    assert!(matches!(err, BufferError::Corrupt { .. }));
    assert!(!err.is_transient());
}
