use anyhow::{Context, Result};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{MarkerBackend, MarkerConfig};
use crate::models::chat::SessionToken;

/// Cross-process "this token has an agent somewhere" flag store.
///
/// Advisory only: it never holds conversation content and the in-process
/// registry stays authoritative when the two disagree.
#[async_trait::async_trait]
pub trait MarkerCache: Send + Sync {
    async fn mark(&self, token: &SessionToken) -> Result<()>;
    async fn is_marked(&self, token: &SessionToken) -> Result<bool>;
    async fn clear(&self, token: &SessionToken) -> Result<()>;
}

/// Build the backend selected in configuration.
pub async fn from_config(config: &MarkerConfig) -> Result<Arc<dyn MarkerCache>> {
    let ttl = Duration::from_secs(config.ttl_secs);
    Ok(match config.backend {
        MarkerBackend::Memory => {
            info!("Using in-memory session marker cache");
            Arc::new(InMemoryMarkerCache::new(config.key_prefix.clone(), ttl))
        }
        MarkerBackend::Redis => {
            info!("Using Redis session marker cache at {}", config.redis_url);
            Arc::new(RedisMarkerCache::connect(&config.redis_url, config.key_prefix.clone(), ttl).await?)
        }
    })
}

/// Process-local marker store with lazy expiry
#[derive(Clone)]
pub struct InMemoryMarkerCache {
    entries: Arc<DashMap<String, Instant>>,
    key_prefix: String,
    ttl: Duration,
}

impl InMemoryMarkerCache {
    pub fn new(key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    fn key(&self, token: &SessionToken) -> String {
        format!("{}{}", self.key_prefix, token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl MarkerCache for InMemoryMarkerCache {
    async fn mark(&self, token: &SessionToken) -> Result<()> {
        self.entries.insert(self.key(token), Instant::now() + self.ttl);
        Ok(())
    }

    async fn is_marked(&self, token: &SessionToken) -> Result<bool> {
        let key = self.key(token);
        let Some(expires_at) = self.entries.get(&key).map(|e| *e.value()) else {
            return Ok(false);
        };

        if Instant::now() >= expires_at {
            self.entries.remove(&key);
            debug!("Marker for session {} expired, removed", token.short());
            return Ok(false);
        }
        Ok(true)
    }

    async fn clear(&self, token: &SessionToken) -> Result<()> {
        self.entries.remove(&self.key(token));
        Ok(())
    }
}

/// Redis-backed markers, visible to every worker process sharing the server
#[derive(Clone)]
pub struct RedisMarkerCache {
    conn: ConnectionManager,
    key_prefix: String,
    ttl: Duration,
}

impl RedisMarkerCache {
    pub async fn connect(url: &str, key_prefix: String, ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { conn, key_prefix, ttl })
    }

    fn key(&self, token: &SessionToken) -> String {
        format!("{}{}", self.key_prefix, token)
    }
}

#[async_trait::async_trait]
impl MarkerCache for RedisMarkerCache {
    async fn mark(&self, token: &SessionToken) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(token), 1u8, self.ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn is_marked(&self, token: &SessionToken) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.key(token)).await?;
        Ok(exists)
    }

    async fn clear(&self, token: &SessionToken) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(token)).await?;
        Ok(())
    }
}
