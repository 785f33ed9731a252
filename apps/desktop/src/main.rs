mod config;
mod terminal;

use std::{future::Future, io::BufRead, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    control_button, ControlButton, QuoteSession, ReactionStore, SessionConfig, SessionHandle,
    StoreKeys, ViewControls,
};
use shared::domain::QuoteCatalog;
use storage::SqliteKvStore;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{load_settings, normalize_database_url},
    terminal::{Input, TerminalRenderer, HELP},
};

const DEFAULT_QUOTES: &str = include_str!("../quotes.json");
const INPUT_QUEUE_CAPACITY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "quotes", about = "Rotating quotes with shared like/dislike counts")]
struct Args {
    #[arg(long)]
    database_url: Option<String>,
    /// JSON array of `{ "text", "author" }` objects; the built-in list when omitted.
    #[arg(long)]
    quotes: Option<PathBuf>,
    #[arg(long)]
    rotation_secs: Option<u64>,
    #[arg(long)]
    poll_millis: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    no_like_control: bool,
    #[arg(long)]
    no_dislike_control: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(v) = args.database_url {
        settings.database_url = v;
    }
    if let Some(v) = args.quotes {
        settings.quotes_path = Some(v);
    }
    if let Some(v) = args.rotation_secs {
        settings.rotation_secs = v;
    }
    if let Some(v) = args.poll_millis {
        settings.poll_millis = v;
    }

    let catalog = Arc::new(load_catalog(settings.quotes_path.as_deref())?);
    let database_url = normalize_database_url(&settings.database_url);
    let kv = SqliteKvStore::new(&database_url).await?;
    let watcher = kv
        .spawn_change_watcher(Duration::from_millis(settings.poll_millis.max(1)))
        .await?;
    tracing::info!(
        database_url = %database_url,
        store_instance = %kv.instance_id(),
        quotes = catalog.len(),
        rotation_secs = settings.rotation_secs,
        "desktop: starting view"
    );

    let store = ReactionStore::new(Arc::new(kv), Arc::clone(&catalog)).with_keys(StoreKeys {
        reactions: settings.reactions_key.clone(),
        last_update: settings.last_update_key.clone(),
    });
    let session_config = SessionConfig {
        rotation_interval: Duration::from_secs(settings.rotation_secs),
        rng_seed: args.seed,
    };
    let session = QuoteSession::start(store, TerminalRenderer::stdout(), session_config).await;

    let (like, like_rx) = control_button();
    let (dislike, dislike_rx) = control_button();
    let controls = ViewControls {
        like: (!args.no_like_control).then_some(like_rx),
        dislike: (!args.no_dislike_control).then_some(dislike_rx),
    };
    let handle = session.spawn(controls);
    eprintln!("{HELP}");

    run_input(
        spawn_stdin_reader(),
        &handle,
        &like,
        &dislike,
        catalog.len(),
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await?;

    handle.shutdown().await?;
    watcher.abort();
    Ok(())
}

// Blocking reads stay on a plain thread so shutdown never waits on stdin.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Feeds input lines to the session until `q` or `shutdown`. Closed input
/// leaves the view running.
async fn run_input<R>(
    mut lines: mpsc::Receiver<String>,
    handle: &SessionHandle<R>,
    like: &ControlButton,
    dislike: &ControlButton,
    quotes: usize,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);
    let mut input_open = true;

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => return Ok(()),
            line = lines.recv(), if input_open => line,
        };
        let Some(line) = line else {
            tracing::info!("desktop: input closed; running until interrupted");
            input_open = false;
            continue;
        };

        match Input::parse(&line) {
            Some(Input::Like) => press(like, "like").await,
            Some(Input::Dislike) => press(dislike, "dislike").await,
            Some(Input::Next) => {
                handle.next().await?;
            }
            Some(Input::Show(index)) => {
                if !handle.show(index).await? {
                    eprintln!("no quote at {index}; there are {quotes}");
                }
            }
            Some(Input::Help) => eprintln!("{HELP}"),
            Some(Input::Quit) => return Ok(()),
            None => {
                if !line.trim().is_empty() {
                    eprintln!("{HELP}");
                }
            }
        }
    }
}

async fn press(button: &ControlButton, control: &str) {
    if !button.press().await {
        tracing::debug!(control, "desktop: control not wired; press ignored");
    }
}

fn load_catalog(path: Option<&std::path::Path>) -> Result<QuoteCatalog> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read quotes from '{}'", path.display()))?;
            QuoteCatalog::from_json_str(&raw)
                .with_context(|| format!("invalid quotes file '{}'", path.display()))
        }
        None => QuoteCatalog::from_json_str(DEFAULT_QUOTES).context("invalid built-in quotes"),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
