use std::time::{Duration, SystemTime, UNIX_EPOCH};

use shared::domain::ViewId;
use storage::{KeyValueStore, SqliteKvStore};
use tokio::time::timeout;

#[tokio::test]
async fn watcher_reports_writes_from_other_store_instances_only() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("quotes_watch_test_{suffix}"));
    let db_path = temp_root.join("quotes.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let first = SqliteKvStore::new(&database_url).await.expect("first");
    let second = SqliteKvStore::new(&database_url).await.expect("second");
    let watcher = second
        .spawn_change_watcher(Duration::from_millis(20))
        .await
        .expect("watcher");
    let mut changes = second.subscribe_changes();

    let writer = ViewId::new();
    first
        .set(writer, "quotes_reactions_last_update", "1700000000000")
        .await
        .expect("write from first");

    let change = timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("watcher should report write")
        .expect("change");
    assert_eq!(change.key, "quotes_reactions_last_update");
    assert_eq!(change.new_value.as_deref(), Some("1700000000000"));
    assert_eq!(change.origin, writer);

    second
        .set(ViewId::new(), "local", "x")
        .await
        .expect("local write");
    let local = changes.recv().await.expect("local change");
    assert_eq!(local.key, "local");
    let duplicate = timeout(Duration::from_millis(200), changes.recv()).await;
    assert!(duplicate.is_err(), "local write must not be re-emitted");

    watcher.abort();
    drop(first);
    drop(second);
    let _ = std::fs::remove_dir_all(temp_root);
}
