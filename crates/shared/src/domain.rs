use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReactionError;

/// Identifies one active view (one running session sharing the store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(pub Uuid);

impl ViewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ViewId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(alias = "word")]
    pub text: String,
    pub author: String,
    #[serde(
        rename = "likes",
        alias = "initialLikes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_likes: Option<u64>,
    #[serde(
        rename = "dislikes",
        alias = "initialDislikes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_dislikes: Option<u64>,
}

impl Quote {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
            initial_likes: None,
            initial_dislikes: None,
        }
    }

    pub fn with_seed_counts(mut self, likes: u64, dislikes: u64) -> Self {
        self.initial_likes = Some(likes);
        self.initial_dislikes = Some(dislikes);
        self
    }

    /// Record a quote starts with when nothing was persisted for it.
    pub fn seed_record(&self) -> ReactionRecord {
        ReactionRecord {
            likes: self.initial_likes.unwrap_or(0),
            dislikes: self.initial_dislikes.unwrap_or(0),
        }
    }
}

/// Ordered, immutable, non-empty quote list. A quote is identified by its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteCatalog {
    quotes: Vec<Quote>,
}

impl QuoteCatalog {
    pub fn new(quotes: Vec<Quote>) -> Result<Self, ReactionError> {
        if quotes.is_empty() {
            return Err(ReactionError::EmptyQuoteList);
        }
        Ok(Self { quotes })
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let quotes: Vec<Quote> = serde_json::from_str(raw)?;
        Ok(Self::new(quotes)?)
    }

    pub fn get(&self, index: usize) -> Option<&Quote> {
        self.quotes.get(index)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Quote)> {
        self.quotes.iter().enumerate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub likes: u64,
    pub dislikes: u64,
}

impl ReactionRecord {
    pub fn increment(&mut self, kind: ReactionKind) {
        match kind {
            ReactionKind::Like => self.likes = self.likes.saturating_add(1),
            ReactionKind::Dislike => self.dislikes = self.dislikes.saturating_add(1),
        }
    }
}

/// Per-quote reaction counts keyed by quote index.
///
/// Serializes as a JSON object with decimal string keys, e.g.
/// `{"0":{"likes":1,"dislikes":0}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionTable(BTreeMap<usize, ReactionRecord>);

impl ReactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&ReactionRecord> {
        self.0.get(&index)
    }

    /// Counts for `index`, zero when the table has no entry.
    pub fn record(&self, index: usize) -> ReactionRecord {
        self.0.get(&index).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, index: usize, record: ReactionRecord) {
        self.0.insert(index, record);
    }

    /// Bumps one counter and returns the updated record, or `None` when the
    /// index has no entry.
    pub fn increment(&mut self, index: usize, kind: ReactionKind) -> Option<ReactionRecord> {
        let record = self.0.get_mut(&index)?;
        record.increment(kind);
        Some(*record)
    }

    /// Inserts the seed record of every catalog quote missing from the table.
    /// Returns whether anything was added.
    pub fn backfill(&mut self, catalog: &QuoteCatalog) -> bool {
        let mut changed = false;
        for (index, quote) in catalog.iter() {
            if !self.0.contains_key(&index) {
                self.0.insert(index, quote.seed_record());
                changed = true;
            }
        }
        changed
    }

    pub fn covers(&self, catalog: &QuoteCatalog) -> bool {
        (0..catalog.len()).all(|index| self.0.contains_key(&index))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ReactionRecord)> {
        self.0.iter().map(|(index, record)| (*index, record))
    }
}
