use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{header, request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{unauthorized_error, DigestResult, Error};
use crate::handlers::AppState;

/// JWT claims the service relies on
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Role (authenticated, anon, ...)
    #[serde(default)]
    pub role: Option<String>,
}

/// Verifies HS256 bearer tokens issued by Supabase Auth
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for the project's JWT secret
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Supabase sets aud to "authenticated"; the subject is what matters here
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a token and return its claims
    pub fn verify(&self, token: &str) -> DigestResult<Claims> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| {
                warn!("JWT validation error: {:?}", e);
                unauthorized_error("Invalid or expired token")
            })?;

        if claims.sub.trim().is_empty() {
            return Err(unauthorized_error("Token has no subject"));
        }
        Ok(claims)
    }
}

/// Bearer token from the Authorization header, if one was sent
pub fn extract_token(parts: &Parts) -> DigestResult<Option<&str>> {
    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized_error("Malformed Authorization header"))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or_else(|| unauthorized_error("Expected a Bearer token"))
}

/// Authenticated caller, identified by the token subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

fn authenticate(parts: &Parts, state: &AppState) -> DigestResult<Option<AuthUser>> {
    let Some(token) = extract_token(parts)? else {
        return Ok(None);
    };
    let verifier = state
        .auth
        .as_ref()
        .ok_or_else(|| unauthorized_error("Bearer authentication is not configured"))?;
    let claims = verifier.verify(token)?;
    Ok(Some(AuthUser(claims.sub)))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?.ok_or_else(|| unauthorized_error("Missing bearer token"))
    }
}

/// No Authorization header yields `None`; a bad one is still rejected
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        authenticate(parts, state)
    }
}
