use super::*;

use client_core::QuoteRenderer;
use shared::domain::{Quote, ReactionRecord};
use storage::MemoryKvStore;
use tokio::{
    sync::oneshot,
    time::{sleep, timeout},
};

struct NullRenderer;

impl QuoteRenderer for NullRenderer {
    fn render_quote(&mut self, _quote: &Quote) {}
    fn render_counts(&mut self, _record: &ReactionRecord) {}
}

struct View {
    handle: SessionHandle<NullRenderer>,
    like: ControlButton,
    dislike: ControlButton,
}

async fn view() -> View {
    let catalog = Arc::new(
        QuoteCatalog::new(
            (0..3)
                .map(|i| Quote::new(format!("quote {i}"), format!("author {i}")))
                .collect(),
        )
        .expect("catalog"),
    );
    let store = ReactionStore::new(Arc::new(MemoryKvStore::new()), catalog);
    let session = QuoteSession::start(store, NullRenderer, SessionConfig::default()).await;
    let (controls, like, dislike) = ViewControls::wired();
    View {
        handle: session.spawn(controls),
        like,
        dislike,
    }
}

async fn closed_input(lines: &[&str]) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(lines.len().max(1));
    for line in lines {
        tx.send(line.to_string()).await.expect("queue line");
    }
    rx
}

#[tokio::test]
async fn pasted_burst_of_likes_counts_every_line() {
    let view = view().await;
    let lines = vec!["l"; 30];
    let input = closed_input(&lines).await;
    let (stop, stopped) = oneshot::channel::<()>();

    let run = run_input(input, &view.handle, &view.like, &view.dislike, 3, async {
        let _ = stopped.await;
    });
    let check = async {
        let likes = timeout(Duration::from_secs(2), async {
            loop {
                let snapshot = view.handle.snapshot().await.expect("snapshot");
                let likes = snapshot.table.record(snapshot.current_index).likes;
                if likes >= 30 {
                    return likes;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("every like applied");
        let _ = stop.send(());
        likes
    };

    let (result, likes) = tokio::join!(run, check);
    result.expect("input loop");
    assert_eq!(likes, 30);
}

#[tokio::test]
async fn closed_input_keeps_the_view_running() {
    let view = view().await;
    let input = closed_input(&[]).await;

    let outcome = timeout(
        Duration::from_millis(100),
        run_input(
            input,
            &view.handle,
            &view.like,
            &view.dislike,
            3,
            std::future::pending(),
        ),
    )
    .await;

    assert!(outcome.is_err(), "input loop returned at end of input");
    assert!(view.handle.snapshot().await.is_ok());
}

#[tokio::test]
async fn quit_line_ends_the_input_loop() {
    let view = view().await;
    let input = closed_input(&["d", "q", "l"]).await;

    timeout(
        Duration::from_secs(2),
        run_input(
            input,
            &view.handle,
            &view.like,
            &view.dislike,
            3,
            std::future::pending(),
        ),
    )
    .await
    .expect("quit honoured")
    .expect("input loop");

    let snapshot = view.handle.snapshot().await.expect("snapshot");
    let record = snapshot.table.record(snapshot.current_index);
    assert_eq!(record.likes, 0);
}
