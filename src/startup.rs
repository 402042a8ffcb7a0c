use crate::auth::JwtVerifier;
use crate::components::google_calendar::{GoogleCalendarClient, OAuthClient};
use crate::components::llm::{AzureOpenAiClient, AzureOpenAiConfig};
use crate::components::session_store::{connect_or_fallback, Sessions};
use crate::components::similarity_store::{SupabaseConfig, SupabaseStore};
use crate::components::{SummaryWorkflow, WorkflowOptions};
use crate::config::Config;
use crate::error::{config_error, DigestResult, Error};
use crate::handlers::{router, AppState};
use crate::shutdown;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Arc<Config>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(config)),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Shared HTTP client with the configured per-request timeout
pub fn build_http_client(config: &Config) -> DigestResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.settings.request_timeout())
        .build()
        .map_err(|e| config_error(&format!("Failed to build HTTP client: {}", e)))
}

/// Wire the production collaborators into a workflow
pub fn build_workflow(config: &Config, client: reqwest::Client) -> DigestResult<SummaryWorkflow> {
    let oauth = OAuthClient::new(
        &config.google_client_id,
        &config.google_client_secret,
        &config.google_redirect_uri,
    )?;
    let calendar = GoogleCalendarClient::new(oauth, client.clone(), &config.google_calendar_id);
    let model = AzureOpenAiClient::new(AzureOpenAiConfig::from(config), client.clone());
    let store = SupabaseStore::new(SupabaseConfig::from(config), client);

    Ok(SummaryWorkflow::new(
        Arc::new(calendar),
        Arc::new(model),
        Arc::new(store),
        WorkflowOptions::from(config),
    ))
}

/// Bearer token verifier, when a JWT secret is configured
pub fn build_verifier(config: &Config) -> Option<Arc<JwtVerifier>> {
    match &config.jwt_secret {
        Some(secret) => Some(Arc::new(JwtVerifier::new(secret))),
        None => {
            warn!("SUPABASE_JWT_SECRET not set; user-bound routes will reject every caller");
            None
        }
    }
}

/// Build handler state, connecting to the session store
pub async fn build_state(config: &Config) -> DigestResult<AppState> {
    let client = build_http_client(config)?;
    let workflow = build_workflow(config, client)?;
    let store = connect_or_fallback(&config.redis_url).await;

    Ok(AppState {
        workflow: Arc::new(workflow),
        sessions: Sessions::new(store, config.settings.session_ttl_secs),
        frontend_url: config.frontend_url.clone(),
        handoff: config.settings.handoff,
        auth: build_verifier(config),
    })
}

/// Serve the HTTP API until a termination signal arrives
pub async fn start_server(config: Arc<Config>) -> miette::Result<()> {
    let state = build_state(&config).await?;
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(Error::from)?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .map_err(Error::from)?;

    info!("Server stopped");
    Ok(())
}
