use crate::error::{
    auth_exchange_error, describe_request_error, describe_status_error, DigestResult,
};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

/// Google consent screen
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Read-only calendar scope
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Seconds before expiry at which a token is treated as stale
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// OAuth2 token pair bound to one calendar account
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry as a UTC timestamp
    pub expires_at: i64,
}

// Tokens stay out of logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    /// Whether the access token is expired or about to be
    pub fn is_expired(&self) -> bool {
        self.expires_at - EXPIRY_LEEWAY_SECS <= Utc::now().timestamp()
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_credential(self, previous_refresh_token: Option<String>) -> Credential {
        let expires_in = self.expires_in.unwrap_or(3600);
        Credential {
            access_token: self.access_token,
            // Refresh grants usually omit the refresh token; keep the old one
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expires_at: Utc::now().timestamp() + expires_in,
        }
    }
}

/// OAuth client settings for the consent and token endpoints
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: Url,
    token_url: String,
}

impl OAuthClient {
    /// Create a new OAuth client against Google's endpoints
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> DigestResult<Self> {
        Self::with_endpoints(
            client_id,
            client_secret,
            redirect_uri,
            GOOGLE_AUTH_URL,
            GOOGLE_TOKEN_URL,
        )
    }

    /// Create a new OAuth client against custom endpoints
    pub fn with_endpoints(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        auth_url: &str,
        token_url: &str,
    ) -> DigestResult<Self> {
        let auth_url = Url::parse(auth_url)
            .map_err(|e| auth_exchange_error(&format!("Invalid consent URL: {}", e)))?;

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            auth_url,
            token_url: token_url.to_string(),
        })
    }

    /// Build the consent URL: read-only scope, offline access, forced re-consent
    pub fn authorization_url(&self, state: Option<&str>) -> String {
        let mut url = self.auth_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("access_type", "offline")
                .append_pair("prompt", "consent")
                .append_pair("scope", CALENDAR_READONLY_SCOPE);
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url.to_string()
    }

    /// Exchange an authorization code for a credential
    pub async fn exchange_code(&self, client: &Client, code: &str) -> DigestResult<Credential> {
        if code.trim().is_empty() {
            return Err(auth_exchange_error("Authorization code is empty"));
        }

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let token = self.request_token(client, &params, "token exchange").await?;
        info!("Authorization code exchanged for tokens");
        Ok(token.into_credential(None))
    }

    /// Refresh an expired credential
    pub async fn refresh(&self, client: &Client, credential: &Credential) -> DigestResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| auth_exchange_error("No refresh token in credential"))?;

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.request_token(client, &params, "token refresh").await?;
        info!("Access token refreshed");
        Ok(token.into_credential(Some(refresh_token.to_string())))
    }

    async fn request_token(
        &self,
        client: &Client,
        params: &[(&str, &str)],
        call: &str,
    ) -> DigestResult<TokenResponse> {
        let response = client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| auth_exchange_error(describe_request_error(call, &e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            error!("Google {} failed with HTTP {}", call, status);
            return Err(auth_exchange_error(describe_status_error(
                call,
                status,
                &error_body,
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| auth_exchange_error(&format!("Failed to parse {} response: {}", call, e)))
    }
}
