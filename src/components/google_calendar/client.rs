use super::models::ProviderEvent;
use super::token::{Credential, OAuthClient};
use super::CalendarProvider;
use crate::error::{
    auth_exchange_error, describe_request_error, describe_status_error, google_calendar_error,
    DigestResult,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{error, info};
use url::Url;

/// Google Calendar REST API root
pub const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Event list response
#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    summary: Option<String>,
    description: Option<String>,
    start: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl From<GoogleEvent> for ProviderEvent {
    fn from(event: GoogleEvent) -> Self {
        let (start_date_time, start_date) = match event.start {
            Some(start) => (start.date_time, start.date),
            None => (None, None),
        };
        ProviderEvent {
            summary: event.summary,
            description: event.description,
            start_date_time,
            start_date,
        }
    }
}

/// Google Calendar provider: OAuth plus event listing
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    oauth: OAuthClient,
    client: Client,
    calendar_id: String,
    api_base: String,
}

impl GoogleCalendarClient {
    /// Create a new client against the public Google API
    pub fn new(oauth: OAuthClient, client: Client, calendar_id: &str) -> Self {
        Self::with_api_base(oauth, client, calendar_id, GOOGLE_CALENDAR_API)
    }

    /// Create a new client against a custom API root
    pub fn with_api_base(
        oauth: OAuthClient,
        client: Client,
        calendar_id: &str,
        api_base: &str,
    ) -> Self {
        Self {
            oauth,
            client,
            calendar_id: calendar_id.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self, max_results: u32) -> DigestResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| google_calendar_error("Calendar API URL cannot be a base"))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);

        url.query_pairs_mut()
            .append_pair("timeMin", &Utc::now().to_rfc3339())
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        Ok(url)
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    fn authorization_url(&self, state: Option<&str>) -> String {
        self.oauth.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str) -> DigestResult<Credential> {
        self.oauth.exchange_code(&self.client, code).await
    }

    async fn refresh(&self, credential: &Credential) -> DigestResult<Credential> {
        self.oauth.refresh(&self.client, credential).await
    }

    async fn list_upcoming_events(
        &self,
        credential: &Credential,
        max_results: u32,
    ) -> DigestResult<Vec<ProviderEvent>> {
        let url = self.events_url(max_results)?;

        // Make API request
        let response = self
            .client
            .get(url)
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| google_calendar_error(describe_request_error("event listing", &e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("Failed to fetch events: HTTP {}", status);
            let failure = describe_status_error("event listing", status, &error_body);
            // A rejected token is an authorization problem, not a listing one
            return Err(if status == StatusCode::UNAUTHORIZED {
                auth_exchange_error(failure)
            } else {
                google_calendar_error(failure)
            });
        }

        let response_data: EventsResponse = response.json().await.map_err(|e| {
            google_calendar_error(&format!("Failed to parse events response: {}", e))
        })?;

        info!("Fetched {} upcoming events", response_data.items.len());

        Ok(response_data
            .items
            .into_iter()
            .map(ProviderEvent::from)
            .collect())
    }
}
