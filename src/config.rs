use crate::error::{config_error, env_error, DigestResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Location of the optional tuning file
pub const SETTINGS_PATH: &str = "config/digest.toml";

/// Default frontend the callback redirects to
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// How the authorization callback hands the digest to the frontend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandoffMode {
    /// Store the digest server-side and redirect with an opaque session id
    #[default]
    Session,
    /// Redirect with the summary and base64 events in the query string
    Query,
}

/// Tunable settings, read from `config/digest.toml` when present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of upcoming events listed per authorization
    pub max_events: u32,
    /// Default minimum cosine similarity for search
    pub search_threshold: f32,
    /// Default maximum number of search results
    pub search_limit: usize,
    /// Timeout applied to every outbound call
    pub request_timeout_secs: u64,
    /// Extra attempts for transient failures
    pub max_retries: u32,
    /// Initial retry backoff, doubled per attempt
    pub retry_backoff_ms: u64,
    /// Callback handoff strategy
    pub handoff: HandoffMode,
    /// Lifetime of handoff sessions and pending authorizations
    pub session_ttl_secs: u64,
    /// Table holding summary rows
    pub summary_table: String,
    /// Nearest-neighbor RPC function
    pub match_function: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_events: 5,
            search_threshold: 0.8,
            search_limit: 5,
            request_timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 250,
            handoff: HandoffMode::Session,
            session_ttl_secs: 600,
            summary_table: "event_summaries".to_string(),
            match_function: "match_summaries".to_string(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML, filling unspecified keys with defaults
    pub fn from_toml(content: &str) -> DigestResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file, or defaults when the file does not exist
    pub fn load_from(path: &Path) -> DigestResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> DigestResult<()> {
        if !(0.0..=1.0).contains(&self.search_threshold) {
            return Err(config_error("search_threshold must be between 0 and 1"));
        }
        if self.max_events == 0 {
            return Err(config_error("max_events must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(config_error("request_timeout_secs must be at least 1"));
        }
        if self.session_ttl_secs == 0 {
            return Err(config_error("session_ttl_secs must be at least 1"));
        }
        Ok(())
    }

    /// Per-call timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Main configuration structure for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Google OAuth client ID
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Redirect URI registered for the OAuth client
    pub google_redirect_uri: String,
    /// Calendar to list events from
    pub google_calendar_id: String,
    /// Azure OpenAI resource endpoint (with trailing slash)
    pub llm_endpoint: String,
    /// Chat completion deployment name
    pub llm_deployment: String,
    /// Azure OpenAI API version
    pub llm_api_version: String,
    /// Azure OpenAI API key
    pub llm_api_key: String,
    /// Embedding deployment name
    pub embedding_deployment: String,
    /// Supabase project URL
    pub store_url: String,
    /// Supabase service-role key
    pub store_service_key: String,
    /// Redis connection URL for sessions and credentials
    pub redis_url: String,
    /// Frontend the callback redirects to
    pub frontend_url: String,
    /// Supabase JWT secret verifying bearer tokens; user routes reject all callers without it
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    /// Timezone used when rendering event times in prompts
    pub timezone: String,
    /// HTTP listen port
    pub port: u16,
    /// Tuning knobs
    pub settings: Settings,
}

impl Config {
    /// Load configuration from environment and settings file
    pub fn load() -> DigestResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let settings = Settings::load_from(Path::new(SETTINGS_PATH))?;
        Self::from_lookup(|key| env::var(key).ok(), settings)
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F, settings: Settings) -> DigestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> DigestResult<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| env_error(key))
        };

        // Required environment variables
        let google_client_id = required("GOOGLE_CLIENT_ID")?;
        let google_client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let google_redirect_uri = required("GOOGLE_REDIRECT_URI")?;
        let llm_endpoint = required("AZURE_OPENAI_ENDPOINT")?;
        let llm_deployment = required("AZURE_OPENAI_DEPLOYMENT")?;
        let llm_api_version = required("AZURE_OPENAI_API_VERSION")?;
        let llm_api_key = required("AZURE_OPENAI_API_KEY")?;
        let embedding_deployment = required("AZURE_OPENAI_EMBEDDING_DEPLOYMENT")?;
        let store_url = required("SUPABASE_URL")?;
        let store_service_key = required("SUPABASE_SERVICE_KEY")?;

        // Parse numeric values
        let port = required("PORT")?
            .parse::<u16>()
            .map_err(|_| config_error("Invalid PORT format"))?;

        url::Url::parse(&google_redirect_uri)
            .map_err(|e| config_error(&format!("Invalid GOOGLE_REDIRECT_URI: {}", e)))?;

        // Optional values
        let google_calendar_id =
            lookup("GOOGLE_CALENDAR_ID").unwrap_or_else(|| "primary".to_string());
        let redis_url =
            lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());
        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());
        let jwt_secret = lookup("SUPABASE_JWT_SECRET").filter(|s| !s.trim().is_empty());
        let timezone = lookup("TIMEZONE").unwrap_or_else(|| String::from("UTC"));
        timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown TIMEZONE: {}", timezone)))?;

        Ok(Config {
            google_client_id,
            google_client_secret,
            google_redirect_uri,
            google_calendar_id,
            llm_endpoint: with_trailing_slash(llm_endpoint),
            llm_deployment,
            llm_api_version,
            llm_api_key,
            embedding_deployment,
            store_url: store_url.trim_end_matches('/').to_string(),
            store_service_key,
            redis_url,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            jwt_secret,
            timezone,
            port,
            settings,
        })
    }

    /// Configured timezone, falling back to UTC
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or(Tz::UTC)
    }
}

fn with_trailing_slash(endpoint: String) -> String {
    if endpoint.ends_with('/') {
        endpoint
    } else {
        format!("{}/", endpoint)
    }
}
