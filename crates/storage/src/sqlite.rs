use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::ViewId;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{KeyValueStore, StorageChange, CHANGE_CHANNEL_CAPACITY};

/// One row of the key-value table. Removed keys keep a row with no value so
/// other processes can observe the removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub value: Option<String>,
    pub revision: i64,
    pub origin: ViewId,
    pub written_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed store. Clones share the pool and the change channel; separate
/// `new` calls (for example, separate processes) only see each other's writes
/// through [`SqliteKvStore::spawn_change_watcher`].
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: Pool<Sqlite>,
    instance: Uuid,
    changes: broadcast::Sender<StorageChange>,
}

impl SqliteKvStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own empty database,
        // so an in-memory store keeps exactly one connection alive.
        let pool_options = if database_url.starts_with("sqlite::memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite store at '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            pool,
            instance: Uuid::new_v4(),
            changes,
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn entry(&self, key: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query(
            "SELECT key, value, revision, origin_view, store_instance, updated_at
             FROM kv_entries
             WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| stored_entry_from_row(&r)).transpose()
    }

    pub async fn latest_revision(&self) -> Result<i64> {
        let revision: Option<i64> = sqlx::query_scalar("SELECT MAX(revision) FROM kv_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(revision.unwrap_or(0))
    }

    /// Rows written after `revision`, oldest first.
    pub async fn entries_since(&self, revision: i64) -> Result<Vec<StoredEntry>> {
        let rows = sqlx::query(
            "SELECT key, value, revision, origin_view, store_instance, updated_at
             FROM kv_entries
             WHERE revision > ?
             ORDER BY revision ASC",
        )
        .bind(revision)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stored_entry_from_row).collect()
    }

    /// Polls the table and re-emits writes made by other store instances as
    /// [`StorageChange`]s. Writes through this instance are emitted directly
    /// by `set`/`remove` and skipped here.
    pub async fn spawn_change_watcher(&self, poll_interval: Duration) -> Result<JoinHandle<()>> {
        let mut last_seen = self
            .latest_revision()
            .await
            .context("failed to read starting revision for change watcher")?;
        let store = self.clone();
        Ok(tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let entries = match store.entries_since(last_seen).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        warn!(error = %err, last_seen, "storage: change poll failed");
                        continue;
                    }
                };
                for entry in entries {
                    last_seen = last_seen.max(entry.revision);
                    if entry.written_by == store.instance {
                        continue;
                    }
                    debug!(
                        key = %entry.key,
                        revision = entry.revision,
                        origin = %entry.origin,
                        "storage: observed external write"
                    );
                    let _ = store.changes.send(StorageChange {
                        key: entry.key,
                        new_value: entry.value,
                        origin: entry.origin,
                    });
                }
            }
        }))
    }

    async fn write(&self, origin: ViewId, key: &str, value: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, revision, origin_view, store_instance, updated_at)
            VALUES (?1, ?2, (SELECT COALESCE(MAX(revision), 0) + 1 FROM kv_entries), ?3, ?4, ?5)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                revision = excluded.revision,
                origin_view = excluded.origin_view,
                store_instance = excluded.store_instance,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(origin.to_string())
        .bind(self.instance.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write key '{key}'"))?;

        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            new_value: value.map(str::to_string),
            origin,
        });
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read key '{key}'"))?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>(0)))
    }

    async fn set(&self, origin: ViewId, key: &str, value: &str) -> Result<()> {
        self.write(origin, key, Some(value)).await
    }

    async fn remove(&self, origin: ViewId, key: &str) -> Result<()> {
        self.write(origin, key, None).await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

fn stored_entry_from_row(row: &SqliteRow) -> Result<StoredEntry> {
    let origin: String = row.try_get("origin_view")?;
    let written_by: String = row.try_get("store_instance")?;
    Ok(StoredEntry {
        key: row.try_get("key")?,
        value: row.try_get("value")?,
        revision: row.try_get("revision")?,
        origin: ViewId::from_str(&origin)
            .with_context(|| format!("invalid origin view id '{origin}'"))?,
        written_by: Uuid::parse_str(&written_by)
            .with_context(|| format!("invalid store instance id '{written_by}'"))?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}
