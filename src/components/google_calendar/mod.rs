mod client;
pub mod models;
pub mod time;
pub mod token;

pub use client::{GoogleCalendarClient, GOOGLE_CALENDAR_API};
pub use models::{normalize_events, CalendarEvent, ProviderEvent, UNTITLED_EVENT};
pub use token::{Credential, OAuthClient};

use crate::error::DigestResult;
use async_trait::async_trait;

/// External calendar provider: consent, token exchange and event listing
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Consent screen URL. Pure URL construction.
    fn authorization_url(&self, state: Option<&str>) -> String;

    /// Exchange an authorization code for a credential
    async fn exchange_code(&self, code: &str) -> DigestResult<Credential>;

    /// Obtain a fresh access token using the credential's refresh token
    async fn refresh(&self, credential: &Credential) -> DigestResult<Credential>;

    /// Upcoming events ordered by start time ascending
    async fn list_upcoming_events(
        &self,
        credential: &Credential,
        max_results: u32,
    ) -> DigestResult<Vec<ProviderEvent>>;
}
