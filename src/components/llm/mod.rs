mod azure;
pub mod prompts;

pub use azure::{AzureOpenAiClient, AzureOpenAiConfig};

use crate::error::DigestResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Hosted language model: chat completions and text embeddings
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion. Succeeds only with non-empty text.
    async fn complete(&self, messages: &[ChatMessage]) -> DigestResult<String>;

    /// Embed text into a fixed-length vector
    async fn embed(&self, text: &str) -> DigestResult<Vec<f32>>;

    /// Identity of the embedding model; stored and queried vectors must share it
    fn embedding_model(&self) -> &str;
}
