use super::{SearchResult, SearchScope, SimilarityStore, SummaryRecord};
use crate::config::Config;
use crate::error::{
    describe_request_error, describe_status_error, search_error, storage_error, DigestResult,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::{error, info};

/// Supabase project settings
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL without trailing slash
    pub url: String,
    pub service_key: String,
    pub table: String,
    pub match_function: String,
}

impl From<&Config> for SupabaseConfig {
    fn from(config: &Config) -> Self {
        Self {
            url: config.store_url.clone(),
            service_key: config.store_service_key.clone(),
            table: config.settings.summary_table.clone(),
            match_function: config.settings.match_function.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter_user_id: Option<&'a str>,
}

/// Similarity store backed by Supabase (PostgREST + pgvector RPC)
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseStore {
    /// Create a new store client
    pub fn new(config: SupabaseConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.url, self.config.table)
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.config.url, self.config.match_function)
    }
}

#[async_trait]
impl SimilarityStore for SupabaseStore {
    async fn append(&self, record: &SummaryRecord) -> DigestResult<()> {
        let response = self
            .authorized(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|e| storage_error(describe_request_error("summary insert", &e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("Summary insert failed with HTTP {}", status);
            return Err(storage_error(describe_status_error(
                "summary insert",
                status,
                &error_body,
            )));
        }

        info!(
            "Stored summary for '{}' ({} dimensions)",
            record.event_title,
            record.embedding.len()
        );
        Ok(())
    }

    async fn match_summaries(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
        scope: &SearchScope,
    ) -> DigestResult<Vec<SearchResult>> {
        let body = MatchRequest {
            query_embedding,
            match_threshold: threshold,
            match_count: count,
            filter_user_id: scope.user_id(),
        };

        let response = self
            .authorized(self.client.post(self.rpc_url()))
            .json(&body)
            .send()
            .await
            .map_err(|e| search_error(describe_request_error("similarity query", &e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("Similarity query failed with HTTP {}", status);
            return Err(search_error(describe_status_error(
                "similarity query",
                status,
                &error_body,
            )));
        }

        response
            .json::<Vec<SearchResult>>()
            .await
            .map_err(|e| search_error(&format!("Failed to parse similarity matches: {}", e)))
    }
}
