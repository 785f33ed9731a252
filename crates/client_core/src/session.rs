use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::domain::{QuoteCatalog, ReactionKind, ReactionRecord, ReactionTable};
use tracing::{debug, info};

use crate::{reaction_store::ReactionStore, render::QuoteRenderer};

pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(10);
pub const MIN_ROTATION_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rotation_interval: Duration,
    /// Fixed seed for quote selection; entropy-seeded when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            rng_seed: None,
        }
    }
}

impl SessionConfig {
    /// Interval the running session rotates on, never shorter than
    /// [`MIN_ROTATION_INTERVAL`].
    pub fn rotation_period(&self) -> Duration {
        self.rotation_interval.max(MIN_ROTATION_INTERVAL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current_index: usize,
    pub table: ReactionTable,
}

/// One view's displayed quote and its cached copy of the reaction table.
pub struct QuoteSession<R> {
    pub(crate) store: ReactionStore,
    catalog: Arc<QuoteCatalog>,
    table: ReactionTable,
    current_index: usize,
    renderer: R,
    rng: StdRng,
    pub(crate) config: SessionConfig,
}

impl<R: QuoteRenderer> QuoteSession<R> {
    /// Shows the placeholder, loads the table and displays a random quote.
    pub async fn start(store: ReactionStore, mut renderer: R, config: SessionConfig) -> Self {
        renderer.render_placeholder();
        let table = store.load().await;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut session = Self {
            catalog: store.catalog(),
            store,
            table,
            current_index: 0,
            renderer,
            rng,
            config,
        };
        session.next();
        info!(
            view_id = %session.store.view_id(),
            quotes = session.catalog.len(),
            index = session.current_index,
            "session: started"
        );
        session
    }

    /// Uniform over the whole catalog; repeats are allowed.
    pub fn select_random(&mut self) -> usize {
        self.rng.gen_range(0..self.catalog.len())
    }

    /// Displays the quote at `index` with its counts. An index with no quote
    /// renders nothing and keeps the current index.
    pub fn show(&mut self, index: usize) -> bool {
        let Some(quote) = self.catalog.get(index) else {
            debug!(index, quotes = self.catalog.len(), "session: no quote at index");
            return false;
        };
        self.current_index = index;
        self.renderer.render_quote(quote);
        self.renderer.render_counts(&self.table.record(index));
        true
    }

    pub fn next(&mut self) -> usize {
        let index = self.select_random();
        self.show(index);
        index
    }

    pub async fn like(&mut self) -> ReactionRecord {
        self.react(ReactionKind::Like).await
    }

    pub async fn dislike(&mut self) -> ReactionRecord {
        self.react(ReactionKind::Dislike).await
    }

    /// Replaces the cached table with one written by another view.
    pub fn apply_external(&mut self, mut table: ReactionTable) {
        table.backfill(&self.catalog);
        self.table = table;
        self.show(self.current_index);
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn table(&self) -> &ReactionTable {
        &self.table
    }

    pub fn store(&self) -> &ReactionStore {
        &self.store
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_index: self.current_index,
            table: self.table.clone(),
        }
    }

    // Unconditional: no per-user limit on reactions.
    async fn react(&mut self, kind: ReactionKind) -> ReactionRecord {
        self.table.backfill(&self.catalog);
        let record = self
            .table
            .increment(self.current_index, kind)
            .unwrap_or_default();
        info!(
            view_id = %self.store.view_id(),
            index = self.current_index,
            ?kind,
            likes = record.likes,
            dislikes = record.dislikes,
            "session: reaction recorded"
        );

        self.store.save(&self.table).await;
        self.store.broadcast(&self.table).await;
        self.show(self.current_index);
        record
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
