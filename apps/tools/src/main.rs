use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::ReactionStore;
use shared::{
    domain::{QuoteCatalog, ReactionTable, ViewId},
    protocol::{decode_last_update, LAST_UPDATE_KEY, REACTIONS_KEY},
};
use storage::{KeyValueStore, SqliteKvStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/quotes.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the stored reaction table.
    Dump,
    /// Remove the reaction table and its last-update stamp.
    Reset,
    /// Fill in a record for every quote in the file that has none yet.
    Seed {
        #[arg(long)]
        quotes: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = SqliteKvStore::new(&cli.database_url).await?;
    storage.health_check().await?;

    match cli.command {
        Command::Dump => {
            let Some(entry) = storage.entry(REACTIONS_KEY).await? else {
                println!("no reactions stored");
                return Ok(());
            };
            let Some(raw) = entry.value else {
                println!("reactions removed at revision {}", entry.revision);
                return Ok(());
            };
            let table: ReactionTable = serde_json::from_str(&raw)
                .with_context(|| format!("stored value under '{REACTIONS_KEY}' is not a table"))?;
            if table.is_empty() {
                println!("reaction table is empty");
            }
            for (index, record) in table.iter() {
                println!("{index:>4}  likes={:<6} dislikes={}", record.likes, record.dislikes);
            }
            println!("revision={} updated_at={}", entry.revision, entry.updated_at);
            if let Some(at) = storage
                .get(LAST_UPDATE_KEY)
                .await?
                .as_deref()
                .and_then(decode_last_update)
            {
                println!("last_update={at}");
            }
        }
        Command::Reset => {
            let origin = ViewId::new();
            storage.remove(origin, REACTIONS_KEY).await?;
            storage.remove(origin, LAST_UPDATE_KEY).await?;
            println!("removed '{REACTIONS_KEY}' and '{LAST_UPDATE_KEY}'");
        }
        Command::Seed { quotes } => {
            let raw = std::fs::read_to_string(&quotes)
                .with_context(|| format!("failed to read quotes from '{}'", quotes.display()))?;
            let catalog = Arc::new(QuoteCatalog::from_json_str(&raw)?);
            let table = ReactionStore::new(Arc::new(storage), Arc::clone(&catalog))
                .load()
                .await;
            println!("seeded {} records for {} quotes", table.len(), catalog.len());
        }
    }

    Ok(())
}
