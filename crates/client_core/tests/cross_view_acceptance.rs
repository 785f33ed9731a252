use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use client_core::{
    ChannelHub, QuoteRenderer, QuoteSession, ReactionStore, SessionConfig, SessionHandle,
    ViewControls,
};
use shared::{
    domain::{Quote, QuoteCatalog, ReactionRecord},
    protocol::CHANNEL_NAME,
};
use storage::{KeyValueStore, MemoryKvStore, SqliteKvStore};
use tokio::time::{sleep, timeout};

struct NullRenderer;

impl QuoteRenderer for NullRenderer {
    fn render_quote(&mut self, _quote: &Quote) {}
    fn render_counts(&mut self, _record: &ReactionRecord) {}
}

fn catalog() -> Arc<QuoteCatalog> {
    Arc::new(
        QuoteCatalog::new(
            (0..5)
                .map(|i| Quote::new(format!("quote {i}"), format!("author {i}")))
                .collect(),
        )
        .expect("catalog"),
    )
}

async fn spawn_view(store: ReactionStore) -> SessionHandle<NullRenderer> {
    QuoteSession::start(store, NullRenderer, SessionConfig::default())
        .await
        .spawn(ViewControls::none())
}

async fn wait_for_likes(view: &SessionHandle<NullRenderer>, index: usize, likes: u64) {
    timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = view.snapshot().await.expect("snapshot");
            if snapshot.table.record(index).likes == likes {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("other view should observe the reaction");
}

#[tokio::test]
async fn like_in_one_view_reaches_another_over_channel() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let hub = ChannelHub::new();
    let view_a = spawn_view(
        ReactionStore::new(Arc::clone(&kv), catalog()).with_channel(hub.open(CHANNEL_NAME).await),
    )
    .await;
    let view_b = spawn_view(
        ReactionStore::new(Arc::clone(&kv), catalog()).with_channel(hub.open(CHANNEL_NAME).await),
    )
    .await;

    assert!(view_a.show(3).await.expect("show"));
    let liked = view_a.like().await.expect("like");
    assert_eq!(liked.likes, 1);

    wait_for_likes(&view_b, 3, 1).await;
}

#[tokio::test]
async fn like_in_one_view_reaches_another_through_store_signal() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let view_a = spawn_view(ReactionStore::new(Arc::clone(&kv), catalog())).await;
    let view_b = spawn_view(ReactionStore::new(Arc::clone(&kv), catalog())).await;

    view_a.show(3).await.expect("show");
    view_a.like().await.expect("like");
    view_a.like().await.expect("like");

    wait_for_likes(&view_b, 3, 2).await;
}

#[tokio::test]
async fn views_in_separate_store_instances_sync_through_sqlite() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("quotes_cross_view_{suffix}"));
    let db_path = temp_root.join("quotes.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let first = SqliteKvStore::new(&database_url).await.expect("first");
    let second = SqliteKvStore::new(&database_url).await.expect("second");
    let watcher = second
        .spawn_change_watcher(Duration::from_millis(20))
        .await
        .expect("watcher");

    let view_a = spawn_view(ReactionStore::new(Arc::new(first), catalog())).await;
    let view_b = spawn_view(ReactionStore::new(Arc::new(second), catalog())).await;

    view_a.show(3).await.expect("show");
    view_a.like().await.expect("like");

    wait_for_likes(&view_b, 3, 1).await;

    watcher.abort();
    view_a.shutdown().await.expect("shutdown a");
    view_b.shutdown().await.expect("shutdown b");
    let _ = std::fs::remove_dir_all(temp_root);
}

#[tokio::test]
async fn reload_after_likes_sees_persisted_counts() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKvStore::new());
    let view = spawn_view(ReactionStore::new(Arc::clone(&kv), catalog())).await;
    view.show(0).await.expect("show");
    view.like().await.expect("like");
    view.dislike().await.expect("dislike");
    let before = view.shutdown().await.expect("shutdown").snapshot();

    let reloaded = ReactionStore::new(kv, catalog()).load().await;
    assert_eq!(reloaded, before.table);
}
