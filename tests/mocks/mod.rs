#![allow(dead_code)]

use async_trait::async_trait;
use calendar_digest::components::google_calendar::{CalendarProvider, Credential, ProviderEvent};
use calendar_digest::components::llm::{ChatMessage, LanguageModel, Role};
use calendar_digest::components::similarity_store::{
    SearchResult, SearchScope, SimilarityStore, SummaryRecord,
};
use calendar_digest::error::{
    auth_exchange_error, embedding_error, search_error, storage_error, summary_error,
    DigestResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Consent screen used by the mock provider
pub const MOCK_CONSENT_URL: &str = "https://consent.test/auth";

/// Code the mock provider accepts
pub const GOOD_CODE: &str = "good-code";

pub fn provider_event(summary: Option<&str>, description: Option<&str>, start: &str) -> ProviderEvent {
    ProviderEvent {
        summary: summary.map(str::to_string),
        description: description.map(str::to_string),
        start_date_time: Some(start.to_string()),
        start_date: None,
    }
}

/// Standup then Review, in provider order
pub fn standup_and_review() -> Vec<ProviderEvent> {
    vec![
        provider_event(Some("Standup"), Some("Daily sync"), "2030-01-07T09:00:00Z"),
        provider_event(Some("Review"), None, "2030-01-08T15:00:00Z"),
    ]
}

/// Mock calendar provider with fixed events
#[derive(Debug, Default)]
pub struct MockCalendar {
    events: Vec<ProviderEvent>,
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub listings: AtomicUsize,
}

impl MockCalendar {
    pub fn new(events: Vec<ProviderEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn credential(expires_at: i64) -> Credential {
        Credential {
            access_token: "access-token".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            expires_at,
        }
    }
}

#[async_trait]
impl CalendarProvider for MockCalendar {
    fn authorization_url(&self, state: Option<&str>) -> String {
        match state {
            Some(state) => format!("{}?state={}", MOCK_CONSENT_URL, state),
            None => MOCK_CONSENT_URL.to_string(),
        }
    }

    async fn exchange_code(&self, code: &str) -> DigestResult<Credential> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == GOOD_CODE {
            Ok(Self::credential(chrono::Utc::now().timestamp() + 3600))
        } else {
            Err(auth_exchange_error("invalid_grant"))
        }
    }

    async fn refresh(&self, _credential: &Credential) -> DigestResult<Credential> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(Credential {
            access_token: "fresh-access-token".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        })
    }

    async fn list_upcoming_events(
        &self,
        _credential: &Credential,
        max_results: u32,
    ) -> DigestResult<Vec<ProviderEvent>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.events.iter().take(max_results as usize).cloned().collect())
    }
}

/// Deterministic bag-of-words embedding: one bucket per hashed word
pub fn embed_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; 64];
    for word in text.split_whitespace() {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(7u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32));
        vector[(hash % 64) as usize] += 1.0;
    }
    vector
}

/// Mock language model
#[derive(Debug, Default)]
pub struct MockModel {
    /// Completions fail when the prompt contains this text
    pub fail_complete_on: Option<String>,
    /// Embeddings fail for every input
    pub fail_embed: bool,
    pub completions: AtomicUsize,
    pub embeddings: AtomicUsize,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_embeddings() -> Self {
        Self {
            fail_embed: true,
            ..Default::default()
        }
    }

    pub fn failing_completions_on(text: &str) -> Self {
        Self {
            fail_complete_on: Some(text.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, messages: &[ChatMessage]) -> DigestResult<String> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(messages.to_vec());

        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if let Some(needle) = &self.fail_complete_on {
            if prompt.contains(needle.as_str()) {
                return Err(summary_error("model unavailable"));
            }
        }

        match prompt.strip_prefix("Title: ") {
            Some(rest) => {
                let title = rest.lines().next().unwrap_or_default();
                Ok(format!("{} in brief", title))
            }
            None => Ok("A focused week with a few key meetings.".to_string()),
        }
    }

    async fn embed(&self, text: &str) -> DigestResult<Vec<f32>> {
        self.embeddings.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed {
            return Err(embedding_error("embedding deployment not found"));
        }
        Ok(embed_words(text))
    }

    fn embedding_model(&self) -> &str {
        "mock-embedding"
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// In-memory similarity store computing cosine similarity like the hosted RPC
#[derive(Debug, Default)]
pub struct MockSimilarityStore {
    pub rows: Mutex<Vec<SummaryRecord>>,
    pub fail_queries: bool,
    pub fail_appends: bool,
}

impl MockSimilarityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_queries() -> Self {
        Self {
            fail_queries: true,
            ..Default::default()
        }
    }

    pub fn failing_appends() -> Self {
        Self {
            fail_appends: true,
            ..Default::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl SimilarityStore for MockSimilarityStore {
    async fn append(&self, record: &SummaryRecord) -> DigestResult<()> {
        if self.fail_appends {
            return Err(storage_error("insert rejected"));
        }
        self.rows.lock().await.push(record.clone());
        Ok(())
    }

    async fn match_summaries(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
        scope: &SearchScope,
    ) -> DigestResult<Vec<SearchResult>> {
        if self.fail_queries {
            return Err(search_error("function match_summaries does not exist"));
        }

        let rows = self.rows.lock().await;
        let mut matches: Vec<SearchResult> = rows
            .iter()
            .filter(|row| scope.user_id().map_or(true, |id| id == row.user_id))
            .map(|row| SearchResult {
                event_title: row.event_title.clone(),
                summary: row.summary.clone(),
                time: row.event_time.clone(),
                similarity: cosine(query_embedding, &row.embedding),
            })
            .filter(|m| m.similarity >= threshold)
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(count);
        Ok(matches)
    }
}
