use super::SessionStore;
use crate::error::{session_error, DigestResult};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client as RedisClient};
use tracing::info;

/// Redis-backed session store sharing one auto-reconnecting connection
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    /// Open a connection and verify the server is reachable
    pub async fn connect(redis_url: &str) -> DigestResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = RedisClient::open(redis_url)
            .map_err(|e| session_error(&format!("Failed to create Redis client: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| session_error(&format!("Failed to connect to Redis: {}", e)))?;
        let store = Self { conn };

        // Fail early so startup can fall back
        let mut conn = store.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| session_error(&format!("Redis PING error: {}", e)))?;

        Ok(store)
    }

    /// Handle onto the shared connection
    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> DigestResult<()> {
        let mut conn = self.connection();

        match ttl_secs {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl)
                .await
                .map_err(|e| session_error(&format!("Redis SETEX error: {}", e))),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| session_error(&format!("Redis SET error: {}", e))),
        }
    }

    async fn get(&self, key: &str) -> DigestResult<Option<String>> {
        let mut conn = self.connection();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| session_error(&format!("Redis GET error: {}", e)))
    }

    async fn take(&self, key: &str) -> DigestResult<Option<String>> {
        let mut conn = self.connection();
        conn.get_del::<_, Option<String>>(key)
            .await
            .map_err(|e| session_error(&format!("Redis GETDEL error: {}", e)))
    }
}
