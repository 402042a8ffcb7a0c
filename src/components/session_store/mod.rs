mod memory;
mod redis_store;

pub use memory::InMemorySessionStore;
pub use redis_store::RedisSessionStore;

use crate::components::google_calendar::Credential;
use crate::components::workflow::CalendarDigest;
use crate::error::{session_error, DigestResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Session store keys
pub mod keys {
    pub const DIGEST_PREFIX: &str = "calendar_digest:session:";
    pub const PENDING_AUTH_PREFIX: &str = "calendar_digest:pending:";
    pub const CREDENTIAL_PREFIX: &str = "calendar_digest:credential:";
}

/// Key/value storage with optional expiry
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Store a value, expiring after `ttl_secs` when given
    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> DigestResult<()>;

    /// Read a value
    async fn get(&self, key: &str) -> DigestResult<Option<String>>;

    /// Read and delete a value
    async fn take(&self, key: &str) -> DigestResult<Option<String>>;
}

/// Connect to Redis, falling back to an in-memory store when unreachable
pub async fn connect_or_fallback(redis_url: &str) -> Arc<dyn SessionStore> {
    match RedisSessionStore::connect(redis_url).await {
        Ok(store) => {
            info!("Connected to Redis successfully");
            Arc::new(store)
        }
        Err(e) => {
            tracing::error!("Failed to connect to Redis: {}", e);
            info!("Using in-memory session store as fallback");
            Arc::new(InMemorySessionStore::new())
        }
    }
}

/// Typed access to handoff sessions, pending authorizations and credentials
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    ttl_secs: u64,
}

impl Sessions {
    /// Wrap a store; `ttl_secs` applies to digests and pending authorizations
    pub fn new(store: Arc<dyn SessionStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    /// Save a digest under a fresh opaque id
    pub async fn save_digest(&self, digest: &CalendarDigest) -> DigestResult<String> {
        let id = Uuid::new_v4().to_string();
        let json = serde_json::to_string(digest)?;
        self.store
            .put(&format!("{}{}", keys::DIGEST_PREFIX, id), &json, Some(self.ttl_secs))
            .await?;
        Ok(id)
    }

    /// Fetch a digest once; later calls with the same id return `None`
    pub async fn take_digest(&self, id: &str) -> DigestResult<Option<CalendarDigest>> {
        let key = format!("{}{}", keys::DIGEST_PREFIX, id);
        match self.store.take(&key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Remember which user started an authorization; returns the OAuth state
    pub async fn begin_pending(&self, user_id: &str) -> DigestResult<String> {
        let state = Uuid::new_v4().to_string();
        self.store
            .put(
                &format!("{}{}", keys::PENDING_AUTH_PREFIX, state),
                user_id,
                Some(self.ttl_secs),
            )
            .await?;
        Ok(state)
    }

    /// Resolve and consume a pending authorization
    pub async fn take_pending(&self, state: &str) -> DigestResult<Option<String>> {
        self.store
            .take(&format!("{}{}", keys::PENDING_AUTH_PREFIX, state))
            .await
    }

    /// Persist a user's credential
    pub async fn save_credential(&self, user_id: &str, credential: &Credential) -> DigestResult<()> {
        if user_id.trim().is_empty() {
            return Err(session_error("Cannot persist a credential without a user id"));
        }
        let json = serde_json::to_string(credential)?;
        self.store
            .put(&format!("{}{}", keys::CREDENTIAL_PREFIX, user_id), &json, None)
            .await
    }

    /// Load a user's credential
    pub async fn load_credential(&self, user_id: &str) -> DigestResult<Option<Credential>> {
        let key = format!("{}{}", keys::CREDENTIAL_PREFIX, user_id);
        match self.store.get(&key).await? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(credential) => Ok(Some(credential)),
                Err(e) => {
                    warn!("Discarding unreadable credential for {}: {}", user_id, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::google_calendar::CalendarEvent;

    fn sessions() -> Sessions {
        Sessions::new(Arc::new(InMemorySessionStore::new()), 60)
    }

    #[tokio::test]
    async fn digest_round_trip_is_one_shot() {
        let sessions = sessions();
        let digest = CalendarDigest {
            summary: "A calm week.".to_string(),
            events: vec![CalendarEvent::new("Standup", "", "2024-01-01T09:00:00Z")],
        };

        let id = sessions.save_digest(&digest).await.unwrap();
        assert_eq!(sessions.take_digest(&id).await.unwrap(), Some(digest));
        assert_eq!(sessions.take_digest(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn pending_authorization_resolves_once() {
        let sessions = sessions();
        let state = sessions.begin_pending("user-1").await.unwrap();

        assert_eq!(sessions.take_pending(&state).await.unwrap().as_deref(), Some("user-1"));
        assert_eq!(sessions.take_pending(&state).await.unwrap(), None);
        assert_eq!(sessions.take_pending("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn credentials_persist_per_user() {
        let sessions = sessions();
        let credential = Credential {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: 42,
        };

        sessions.save_credential("user-1", &credential).await.unwrap();
        assert_eq!(
            sessions.load_credential("user-1").await.unwrap(),
            Some(credential.clone())
        );
        // Loading does not consume
        assert!(sessions.load_credential("user-1").await.unwrap().is_some());
        assert_eq!(sessions.load_credential("user-2").await.unwrap(), None);
        assert!(sessions.save_credential(" ", &credential).await.is_err());
    }
}
