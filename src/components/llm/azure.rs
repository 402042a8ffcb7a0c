use super::prompts::SUMMARY_TEMPERATURE;
use super::{ChatMessage, LanguageModel};
use crate::config::Config;
use crate::error::{
    describe_request_error, describe_status_error, embedding_error, summary_error, DigestResult,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Azure OpenAI deployment settings
#[derive(Debug, Clone)]
pub struct AzureOpenAiConfig {
    /// Resource endpoint, ending with a slash
    pub endpoint: String,
    pub chat_deployment: String,
    pub embedding_deployment: String,
    pub api_version: String,
    pub api_key: String,
}

impl From<&Config> for AzureOpenAiConfig {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.llm_endpoint.clone(),
            chat_deployment: config.llm_deployment.clone(),
            embedding_deployment: config.embedding_deployment.clone(),
            api_version: config.llm_api_version.clone(),
            api_key: config.llm_api_key.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Azure OpenAI client for chat completions and embeddings
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    client: Client,
    config: AzureOpenAiConfig,
}

impl AzureOpenAiClient {
    /// Create a new client
    pub fn new(config: AzureOpenAiConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}openai/deployments/{}/{}?api-version={}",
            self.config.endpoint, deployment, operation, self.config.api_version
        )
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> DigestResult<String> {
        let url = self.deployment_url(&self.config.chat_deployment, "chat/completions");
        let body = ChatCompletionRequest {
            messages,
            temperature: SUMMARY_TEMPERATURE,
        };

        debug!("Sending {} messages to chat completion", messages.len());
        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| summary_error(describe_request_error("chat completion", &e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("Chat completion failed with HTTP {}", status);
            return Err(summary_error(describe_status_error(
                "chat completion",
                status,
                &error_body,
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            summary_error(&format!("Failed to parse chat completion response: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| summary_error("Chat completion returned no content"))
    }

    async fn embed(&self, text: &str) -> DigestResult<Vec<f32>> {
        let url = self.deployment_url(&self.config.embedding_deployment, "embeddings");

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&EmbeddingRequest { input: text })
            .send()
            .await
            .map_err(|e| embedding_error(describe_request_error("embeddings", &e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("Embedding request failed with HTTP {}", status);
            return Err(embedding_error(describe_status_error(
                "embeddings",
                status,
                &error_body,
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            embedding_error(&format!("Failed to parse embeddings response: {}", e))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| embedding_error("Embeddings response contained no vector"))
    }

    fn embedding_model(&self) -> &str {
        &self.config.embedding_deployment
    }
}
