//! Exporter behaviour over the pool: snapshot writing, the single retry on a
//! broken read, and the retention sweep.

mod common;

use common::*;
use failover_pool::error::ExportError;
use failover_pool::pool::Role;
use failover_pool::BackupExporter;
use std::path::Path;
use std::time::Duration;

fn snapshot_files(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => panic!("read_dir failed: {e}"),
    }
}

#[tokio::test]
async fn test_export_writes_snapshot_and_returns_connection() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, board, _probe_rx) = build_pool(
        vec![descriptor(Role::Primary, "db-primary")],
        fast_pool_settings(),
    );
    board.put_table("client_bot_signups", sample_rows(3));
    let exporter = BackupExporter::new(
        pool.clone(),
        backup_settings(dir.path(), &["client_bot_signups"]),
    );

    let snapshot = exporter.export_table("client_bot_signups").await.unwrap();
    assert_eq!(snapshot.row_count, 3);

    let files = snapshot_files(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("backup_client_bot_signups_"));
    assert!(files[0].ends_with(".json"));

    let body = std::fs::read_to_string(dir.path().join(&files[0])).unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["table"], "client_bot_signups");
    assert_eq!(value["row_count"], 3);
    assert_eq!(value["rows"].as_array().unwrap().len(), 3);
    assert_eq!(value["rows"][0]["id"], 1);

    // The connection went back to the pool before the file was written.
    let stats = pool.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.idle, 1);
}

#[tokio::test]
async fn test_export_retries_once_after_broken_read() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, board, _probe_rx) = build_pool(
        vec![descriptor(Role::Primary, "db-primary")],
        fast_pool_settings(),
    );
    board.put_table("master_bot_data", sample_rows(5));
    board.fail_next_fetches(1);
    let exporter = BackupExporter::new(
        pool.clone(),
        backup_settings(dir.path(), &["master_bot_data"]),
    );

    let snapshot = exporter.export_table("master_bot_data").await.unwrap();
    assert_eq!(snapshot.row_count, 5);
    assert_eq!(snapshot_files(dir.path()).len(), 1);

    // The broken connection was discarded; the retry ran on a fresh one.
    assert_eq!(board.opened(), 2);
    assert_eq!(pool.stats().in_use, 0);
}

#[tokio::test]
async fn test_export_gives_up_after_second_failure_without_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, board, _probe_rx) = build_pool(
        vec![descriptor(Role::Primary, "db-primary")],
        fast_pool_settings(),
    );
    board.put_table("master_bot_data", sample_rows(5));
    board.fail_next_fetches(2);
    let exporter = BackupExporter::new(
        pool,
        backup_settings(dir.path(), &["master_bot_data"]),
    );

    let error = exporter.export_table("master_bot_data").await.unwrap_err();
    match error {
        ExportError::Failed { table, .. } => assert_eq!(table, "master_bot_data"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(snapshot_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_unknown_table_fails_but_keeps_connection_recyclable() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, board, _probe_rx) = build_pool(
        vec![descriptor(Role::Primary, "db-primary")],
        fast_pool_settings(),
    );
    let exporter = BackupExporter::new(
        pool.clone(),
        backup_settings(dir.path(), &["user_session_data"]),
    );

    let error = exporter.export_table("user_session_data").await.unwrap_err();
    assert!(matches!(error, ExportError::Failed { .. }));
    // A query error is not fatal to the connection: both attempts reused one
    // session and it is back in the pool.
    assert_eq!(board.opened(), 1);
    assert_eq!(pool.stats().idle, 1);
}

#[tokio::test]
async fn test_export_all_continues_past_failures() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, board, _probe_rx) = build_pool(
        vec![descriptor(Role::Primary, "db-primary")],
        fast_pool_settings(),
    );
    board.put_table("master_bot_data", sample_rows(2));
    board.put_table("user_session_data", sample_rows(4));
    let exporter = BackupExporter::new(
        pool,
        backup_settings(
            dir.path(),
            &["master_bot_data", "client_bot_signups", "user_session_data"],
        ),
    );

    let results = exporter.export_all().await;
    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err(), "missing table must fail");
    assert!(results[2].1.is_ok(), "later tables still export");
}

#[tokio::test]
async fn test_cleanup_removes_expired_snapshots_only() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("backup_master_bot_data_20200101_000000.json"),
        "{}",
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

    let (pool, _board, _probe_rx) = build_pool(
        vec![descriptor(Role::Primary, "db-primary")],
        fast_pool_settings(),
    );
    let mut settings = backup_settings(dir.path(), &["master_bot_data"]);
    settings.keep_days = 0;
    let exporter = BackupExporter::new(pool, settings);

    // With a zero-day window anything already on disk is expired.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let removed = exporter.cleanup_old_snapshots().unwrap();
    assert_eq!(removed, 1);

    let remaining = snapshot_files(dir.path());
    assert_eq!(remaining, vec!["notes.txt".to_string()]);
}

#[tokio::test]
async fn test_cleanup_treats_missing_directory_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, _board, _probe_rx) = build_pool(
        vec![descriptor(Role::Primary, "db-primary")],
        fast_pool_settings(),
    );
    let exporter = BackupExporter::new(
        pool,
        backup_settings(&dir.path().join("does-not-exist"), &["master_bot_data"]),
    );

    assert_eq!(exporter.cleanup_old_snapshots().unwrap(), 0);
}
