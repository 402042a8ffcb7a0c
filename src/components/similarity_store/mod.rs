mod supabase;

pub use supabase::{SupabaseConfig, SupabaseStore};

use crate::error::DigestResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One stored per-event summary with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub user_id: String,
    pub event_title: String,
    pub event_description: String,
    pub event_time: String,
    pub summary: String,
    /// Embedding of `summary`, never of the raw event
    pub embedding: Vec<f32>,
}

/// One nearest-neighbor match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub event_title: String,
    pub summary: String,
    #[serde(alias = "event_time")]
    pub time: String,
    pub similarity: f32,
}

/// Which rows a search may match
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Every stored row
    #[default]
    Global,
    /// Rows belonging to one user
    User(String),
}

impl SearchScope {
    /// Scope for an optional user id; blank ids mean global
    pub fn from_user_id(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => SearchScope::User(id.to_string()),
            None => SearchScope::Global,
        }
    }

    /// User id filter, if any
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SearchScope::Global => None,
            SearchScope::User(id) => Some(id),
        }
    }
}

/// Append-only summary table with a server-side similarity query
#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Append one record
    async fn append(&self, record: &SummaryRecord) -> DigestResult<()>;

    /// Rows with cosine similarity at or above `threshold`, best first
    async fn match_summaries(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
        scope: &SearchScope,
    ) -> DigestResult<Vec<SearchResult>>;
}

/// Apply threshold, collapse duplicate titles and rank matches.
///
/// Matches below `threshold` are dropped (equal is kept). Among matches sharing
/// an `event_title` only the most similar survives. The result is ordered by
/// similarity descending and holds at most `limit` entries.
pub fn rank_matches(matches: Vec<SearchResult>, threshold: f32, limit: usize) -> Vec<SearchResult> {
    let mut best: HashMap<String, SearchResult> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();

    for candidate in matches.into_iter().filter(|m| m.similarity >= threshold) {
        let (seen, improves) = match best.get(&candidate.event_title) {
            Some(existing) => (true, candidate.similarity > existing.similarity),
            None => (false, true),
        };
        if !seen {
            first_seen.push(candidate.event_title.clone());
        }
        if improves {
            best.insert(candidate.event_title.clone(), candidate);
        }
    }

    let mut ranked: Vec<SearchResult> = first_seen
        .iter()
        .filter_map(|title| best.remove(title))
        .collect();
    // Stable sort keeps first-seen order among equal scores
    ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ranked.truncate(limit);
    ranked
}
