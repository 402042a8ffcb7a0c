use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::auth::{AuthUser, JwtVerifier};
use crate::components::google_calendar::{CalendarEvent, Credential};
use crate::components::session_store::Sessions;
use crate::components::similarity_store::SearchScope;
use crate::components::workflow::{CalendarDigest, SummaryWorkflow};
use crate::config::HandoffMode;
use crate::error::{
    invalid_input_error, not_found_error, unauthorized_error, DigestResult, Error,
};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<SummaryWorkflow>,
    pub sessions: Sessions,
    /// Frontend the callback redirects to, without trailing slash
    pub frontend_url: String,
    pub handoff: HandoffMode,
    /// Bearer token verifier; without one every user-bound route answers 401
    pub auth: Option<Arc<JwtVerifier>>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/auth/calendar/begin", get(begin_handler))
        .route("/auth/calendar/callback", get(callback_handler))
        .route("/session/{id}", get(session_handler))
        .route("/summary/regenerate", post(regenerate_handler))
        .route("/summary/store-all", post(store_all_handler))
        .route("/summary/refresh", post(refresh_handler))
        .route("/embedding/generate", post(generate_embedding_handler))
        .route("/embedding/store", post(store_embedding_handler))
        .route("/search", post(search_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Malformed or incomplete JSON bodies are client errors in the usual error shape
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        invalid_input_error(&rejection.body_text())
    }
}

/// 302 redirect
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

// Handler for API health check
pub async fn health_handler() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct BeginParams {
    pub user_id: Option<String>,
}

/// Redirect to the provider's consent screen.
///
/// With a bearer token the consent is bound to the token's subject so the
/// credential can be persisted; a `user_id` parameter must name that subject.
pub async fn begin_handler(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    Query(params): Query<BeginParams>,
) -> Result<Response, Error> {
    let requested = params.user_id.filter(|id| !id.trim().is_empty());

    let user_id = match (auth, requested) {
        (Some(AuthUser(sub)), None) => Some(sub),
        (Some(AuthUser(sub)), Some(requested)) if requested == sub => Some(sub),
        (Some(_), Some(_)) => {
            return Err(unauthorized_error(
                "user_id does not match the authenticated user",
            ))
        }
        (None, Some(_)) => {
            return Err(unauthorized_error(
                "Binding a calendar to a user requires a bearer token",
            ))
        }
        (None, None) => None,
    };

    // Recording the binding is best effort; the redirect always happens
    let oauth_state = match user_id {
        Some(user_id) => match state.sessions.begin_pending(&user_id).await {
            Ok(oauth_state) => Some(oauth_state),
            Err(e) => {
                warn!("Could not record pending authorization: {}", e);
                None
            }
        },
        None => None,
    };

    let url = state.workflow.begin_authorization(oauth_state.as_deref());
    info!("Redirecting to calendar consent screen");
    Ok(found(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finish authorization, summarize and hand the digest to the frontend
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(denied) = params.error {
        warn!("Calendar consent was not granted: {}", denied);
        return (StatusCode::BAD_REQUEST, "Calendar access was not granted").into_response();
    }

    let Some(code) = params.code.filter(|c| !c.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing authorization code").into_response();
    };

    let completed = match state.workflow.complete_authorization(&code).await {
        Ok(completed) => completed,
        Err(e) => {
            error!("Authorization callback failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication or event fetch failed",
            )
                .into_response();
        }
    };

    if let Some(oauth_state) = params.state {
        persist_credential(&state.sessions, &oauth_state, &completed.credential).await;
    }

    match handoff_location(&state, &completed.digest).await {
        Ok(location) => found(&location),
        Err(e) => {
            error!("Could not hand off digest: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication or event fetch failed",
            )
                .into_response()
        }
    }
}

async fn persist_credential(
    sessions: &Sessions,
    oauth_state: &str,
    credential: &Credential,
) {
    match sessions.take_pending(oauth_state).await {
        Ok(Some(user_id)) => match sessions.save_credential(&user_id, credential).await {
            Ok(()) => info!("Persisted calendar credential for {}", user_id),
            Err(e) => warn!("Could not persist credential for {}: {}", user_id, e),
        },
        Ok(None) => warn!("Callback state does not match a pending authorization"),
        Err(e) => warn!("Could not resolve pending authorization: {}", e),
    }
}

/// Frontend URL carrying the digest, according to the handoff mode
pub async fn handoff_location(state: &AppState, digest: &CalendarDigest) -> DigestResult<String> {
    match state.handoff {
        HandoffMode::Session => {
            let id = state.sessions.save_digest(digest).await?;
            Ok(format!("{}/?session={}", state.frontend_url, id))
        }
        HandoffMode::Query => {
            let events_json = serde_json::to_string(&digest.events)?;
            Ok(format!(
                "{}/?summary={}&events={}",
                state.frontend_url,
                urlencoding::encode(&digest.summary),
                urlencoding::encode(&STANDARD.encode(events_json))
            ))
        }
    }
}

/// One-shot retrieval of a handed-off digest
pub async fn session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CalendarDigest>, Response> {
    match state.sessions.take_digest(&id).await {
        Ok(Some(digest)) => Ok(Json(digest)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found or expired" })),
        )
            .into_response()),
        Err(e) => Err(e.into_response()),
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Terse summary for one event
pub async fn regenerate_handler(
    State(state): State<AppState>,
    WithRejection(Json(event), _): WithRejection<Json<CalendarEvent>, Error>,
) -> Result<Json<SummaryResponse>, Error> {
    let summary = state.workflow.regenerate_event_summary(&event).await?;
    Ok(Json(SummaryResponse { summary }))
}

#[derive(Debug, Deserialize)]
pub struct StoreAllRequest {
    pub user_id: String,
    pub events: Vec<CalendarEvent>,
}

/// Regenerate and store every event's summary
pub async fn store_all_handler(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<StoreAllRequest>, Error>,
) -> Result<Response, Error> {
    if request.user_id.trim().is_empty() {
        return Err(invalid_input_error("user_id must not be empty"));
    }
    let report = state
        .workflow
        .store_all_event_summaries(&request.user_id, &request.events)
        .await;
    Ok(Json(report).into_response())
}

/// Re-summarize the calendar using the caller's persisted credential
pub async fn refresh_handler(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CalendarDigest>, Error> {
    let credential = state
        .sessions
        .load_credential(&user_id)
        .await?
        .ok_or_else(|| not_found_error("No stored calendar credential for this user"))?;

    let refreshed = state.workflow.refresh_digest(&credential).await?;
    if refreshed.credential != credential {
        if let Err(e) = state
            .sessions
            .save_credential(&user_id, &refreshed.credential)
            .await
        {
            warn!("Could not persist refreshed credential: {}", e);
        }
    }
    Ok(Json(refreshed.digest))
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(rename = "inputText")]
    pub input_text: String,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
}

/// Embedding of arbitrary text
pub async fn generate_embedding_handler(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<EmbeddingRequest>, Error>,
) -> Result<Json<EmbeddingResponse>, Error> {
    let embedding = state.workflow.generate_embedding(&request.input_text).await?;
    Ok(Json(EmbeddingResponse { embedding }))
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time: String,
    pub summary: String,
}

/// Embed and store one event summary
pub async fn store_embedding_handler(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<StoreRequest>, Error>,
) -> Result<Json<serde_json::Value>, Error> {
    let event = CalendarEvent::new(request.title, request.description, request.time);
    state
        .workflow
        .store_event_summary(&request.user_id, &event, &request.summary)
        .await?;
    Ok(Json(json!({ "message": "Embedding stored successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "inputText")]
    pub input_text: String,
    pub user_id: Option<String>,
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
}

/// Similar past events; failures come back as an empty result with an error
pub async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let e = Error::from(rejection);
            warn!("Search rejected: {}", e);
            return (
                status_for(&e),
                Json(json!({ "matches": [], "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let scope = SearchScope::from_user_id(request.user_id.as_deref());
    match state
        .workflow
        .search_similar_events(&scope, &request.input_text, request.threshold, request.limit)
        .await
    {
        Ok(matches) => Json(json!({ "matches": matches })).into_response(),
        Err(e) => {
            let status = status_for(&e);
            error!("Search failed: {}", e);
            (
                status,
                Json(json!({ "matches": [], "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
