use super::SessionStore;
use crate::error::DigestResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// In-memory session store, used when Redis is unavailable and in tests
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_live(expires_at: &Option<Instant>) -> bool {
    expires_at.map_or(true, |at| Instant::now() < at)
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> DigestResult<()> {
        // A TTL past the clock's range never expires
        let expires_at =
            ttl_secs.and_then(|ttl| Instant::now().checked_add(Duration::from_secs(ttl)));
        let mut entries = self.entries.write().await;
        // Drop expired entries on write so the map stays bounded
        entries.retain(|_, (_, at)| is_live(at));
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> DigestResult<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, at)| is_live(at))
            .map(|(value, _)| value.clone()))
    }

    async fn take(&self, key: &str) -> DigestResult<Option<String>> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .filter(|(_, at)| is_live(at))
            .map(|(value, _)| value))
    }
}
