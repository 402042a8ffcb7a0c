//! Summarization workflow.
//!
//! Orchestrates the calendar provider, the language model and the similarity
//! store. Every operation is a stateless request/response transform: nothing
//! is shared between in-flight calls except the injected client handles.

use crate::components::google_calendar::{
    normalize_events, CalendarEvent, CalendarProvider, Credential,
};
use crate::components::llm::{prompts, LanguageModel};
use crate::components::similarity_store::{
    rank_matches, SearchResult, SearchScope, SimilarityStore, SummaryRecord,
};
use crate::config::Config;
use crate::error::{invalid_input_error, DigestResult};
use crate::utils::retry::{with_retry, RetryPolicy};
use chrono_tz::Tz;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Holistic summary plus the events it covers, in provider order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDigest {
    pub summary: String,
    pub events: Vec<CalendarEvent>,
}

/// Result of a successful authorization callback
#[derive(Debug, Clone)]
pub struct CompletedAuthorization {
    pub digest: CalendarDigest,
    pub credential: Credential,
}

/// One event that could not be summarized or stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreFailure {
    pub title: String,
    pub error: String,
}

/// Outcome of storing a batch of events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkStoreReport {
    pub stored: usize,
    pub failed: Vec<StoreFailure>,
}

/// Tunables for the workflow
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub max_events: u32,
    pub timezone: Tz,
    pub search_threshold: f32,
    pub search_limit: usize,
    pub retry: RetryPolicy,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_events: 5,
            timezone: Tz::UTC,
            search_threshold: 0.8,
            search_limit: 5,
            retry: RetryPolicy::none(),
        }
    }
}

impl From<&Config> for WorkflowOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_events: config.settings.max_events,
            timezone: config.tz(),
            search_threshold: config.settings.search_threshold,
            search_limit: config.settings.search_limit,
            retry: RetryPolicy::new(config.settings.max_retries, config.settings.retry_backoff_ms),
        }
    }
}

/// The summarization-and-retrieval workflow
pub struct SummaryWorkflow {
    calendar: Arc<dyn CalendarProvider>,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn SimilarityStore>,
    options: WorkflowOptions,
}

impl SummaryWorkflow {
    /// Create a workflow over the three collaborators
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn SimilarityStore>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            calendar,
            model,
            store,
            options,
        }
    }

    /// Workflow options in effect
    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Consent URL for the calendar provider
    pub fn begin_authorization(&self, state: Option<&str>) -> String {
        self.calendar.authorization_url(state)
    }

    /// Exchange the code, list upcoming events and summarize them
    pub async fn complete_authorization(&self, code: &str) -> DigestResult<CompletedAuthorization> {
        info!("Completing calendar authorization");

        let credential = self
            .calendar
            .exchange_code(code)
            .await
            .inspect_err(|e| error!("Authorization code exchange failed: {}", e))?;

        let digest = self.summarize_calendar(&credential).await?;
        Ok(CompletedAuthorization { digest, credential })
    }

    /// Summarize upcoming events using an existing credential, refreshing it first
    /// when expired. Returns the credential actually used.
    pub async fn refresh_digest(
        &self,
        credential: &Credential,
    ) -> DigestResult<CompletedAuthorization> {
        let credential = if credential.is_expired() {
            info!("Stored credential expired, refreshing");
            with_retry(self.options.retry, "token refresh", || {
                self.calendar.refresh(credential)
            })
            .await?
        } else {
            credential.clone()
        };

        let digest = self.summarize_calendar(&credential).await?;
        Ok(CompletedAuthorization { digest, credential })
    }

    /// List, normalize and summarize upcoming events as one holistic digest
    pub async fn summarize_calendar(&self, credential: &Credential) -> DigestResult<CalendarDigest> {
        let max_events = self.options.max_events;
        let provider_events = with_retry(self.options.retry, "event listing", || {
            self.calendar.list_upcoming_events(credential, max_events)
        })
        .await
        .inspect_err(|e| error!("Event listing failed: {}", e))?;

        let events = normalize_events(&provider_events);
        let messages = prompts::overview_messages(&events, self.options.timezone);

        let summary = with_retry(self.options.retry, "chat completion", || {
            self.model.complete(&messages)
        })
        .await
        .inspect_err(|e| error!("Overview summary failed: {}", e))?;

        info!(
            "Generated overview for {} events ({} chars)",
            events.len(),
            summary.len()
        );
        Ok(CalendarDigest { summary, events })
    }

    /// Terse summary of a single event
    pub async fn regenerate_event_summary(&self, event: &CalendarEvent) -> DigestResult<String> {
        let messages = prompts::event_messages(event, self.options.timezone);

        let summary = with_retry(self.options.retry, "chat completion", || {
            self.model.complete(&messages)
        })
        .await
        .inspect_err(|e| error!("Summary regeneration for '{}' failed: {}", event.title, e))?;

        info!("Regenerated summary for '{}'", event.title);
        Ok(summary)
    }

    /// Embedding of arbitrary text
    pub async fn generate_embedding(&self, text: &str) -> DigestResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(invalid_input_error("inputText must not be empty"));
        }

        with_retry(self.options.retry, "embeddings", || self.model.embed(text))
            .await
            .inspect_err(|e| error!("Embedding generation failed: {}", e))
    }

    /// Embed `summary` and append one record. Nothing is written unless the
    /// embedding succeeds.
    pub async fn store_event_summary(
        &self,
        user_id: &str,
        event: &CalendarEvent,
        summary: &str,
    ) -> DigestResult<()> {
        if user_id.trim().is_empty() {
            return Err(invalid_input_error("user_id must not be empty"));
        }
        if summary.trim().is_empty() {
            return Err(invalid_input_error("summary must not be empty"));
        }

        let embedding = with_retry(self.options.retry, "embeddings", || {
            self.model.embed(summary)
        })
        .await
        .inspect_err(|e| error!("Embedding for '{}' failed: {}", event.title, e))?;

        let record = SummaryRecord {
            user_id: user_id.to_string(),
            event_title: event.title.clone(),
            event_description: event.description.clone(),
            event_time: event.time.clone(),
            summary: summary.to_string(),
            embedding,
        };

        with_retry(self.options.retry, "summary insert", || self.store.append(&record))
            .await
            .inspect_err(|e| error!("Storing summary for '{}' failed: {}", event.title, e))?;

        info!(
            "Stored summary for '{}' with {}",
            event.title,
            self.model.embedding_model()
        );
        Ok(())
    }

    /// Regenerate and store a summary for every event. A failing event does not
    /// affect its siblings.
    pub async fn store_all_event_summaries(
        &self,
        user_id: &str,
        events: &[CalendarEvent],
    ) -> BulkStoreReport {
        let outcomes = join_all(events.iter().map(|event| async move {
            match self.regenerate_event_summary(event).await {
                Ok(summary) => self.store_event_summary(user_id, event, &summary).await,
                Err(e) => Err(e),
            }
        }))
        .await;

        let mut report = BulkStoreReport::default();
        for (event, outcome) in events.iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.stored += 1,
                Err(e) => report.failed.push(StoreFailure {
                    title: event.title.clone(),
                    error: e.to_string(),
                }),
            }
        }

        if !report.failed.is_empty() {
            warn!(
                "Stored {} of {} event summaries",
                report.stored,
                events.len()
            );
        }
        report
    }

    /// Past summaries semantically similar to `query`, best first, one per title
    pub async fn search_similar_events(
        &self,
        scope: &SearchScope,
        query: &str,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> DigestResult<Vec<SearchResult>> {
        let threshold = threshold.unwrap_or(self.options.search_threshold);
        let limit = limit.unwrap_or(self.options.search_limit);

        if query.trim().is_empty() {
            return Err(invalid_input_error("inputText must not be empty"));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid_input_error("threshold must be between 0 and 1"));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding = with_retry(self.options.retry, "embeddings", || self.model.embed(query))
            .await
            .inspect_err(|e| error!("Embedding search query failed: {}", e))?;

        let matches = with_retry(self.options.retry, "similarity query", || {
            self.store
                .match_summaries(&embedding, threshold, limit, scope)
        })
        .await
        .inspect_err(|e| error!("Similarity query failed: {}", e))?;

        let ranked = rank_matches(matches, threshold, limit);
        info!(
            "Search returned {} matches with {}",
            ranked.len(),
            self.model.embedding_model()
        );
        Ok(ranked)
    }
}
