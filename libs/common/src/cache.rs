//! Key-value store driver used for sessions
//!
//! This module provides the [`KeyValueStore`] abstraction (string values with
//! TTL plus set-valued index keys) and two backends: Redis for deployments and
//! an in-memory map for local runs and tests.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, IntoConnectionInfo, Script};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{CacheError, CacheResult};

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Optional password, overrides the one in the URL
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_PASSWORD`: Password (default: none)
    /// - `REDIS_DB`: Logical database (default: 0)
    /// - `REDIS_MAX_CONNECTIONS`: Maximum number of connections (default: 10)
    pub fn from_env() -> CacheResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let password = std::env::var("REDIS_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty());
        let db = std::env::var("REDIS_DB")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| CacheError::Connection("REDIS_DB must be an integer".to_string()))?;
        let max_connections = std::env::var("REDIS_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        Ok(RedisConfig {
            url,
            password,
            db,
            max_connections,
        })
    }
}

/// Session-store primitives: TTL'd string keys and set-valued index keys
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value. Missing and expired keys both yield `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Atomically write `key = value` with a TTL and add `member` to the set at
    /// `index_key`, refreshing the index TTL to `ttl`. Nothing is written when
    /// `key` already holds a live value; the result is `false` in that case.
    async fn set_indexed(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        index_key: &str,
        member: &str,
    ) -> CacheResult<bool>;

    /// Atomically delete `key` and remove `member` from the set at `index_key`
    async fn delete_indexed(&self, key: &str, index_key: &str, member: &str) -> CacheResult<()>;

    async fn set_members(&self, index_key: &str) -> CacheResult<Vec<String>>;

    async fn set_remove(&self, index_key: &str, member: &str) -> CacheResult<()>;

    async fn health_check(&self) -> CacheResult<bool>;
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let mut info = config.url.as_str().into_connection_info()?;
        if config.password.is_some() {
            info.redis.password = config.password.clone();
        }
        info.redis.db = config.db;

        let client = Client::open(info)?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }
}

/// SET NX EX on KEYS[1], then index ARGV[3] under KEYS[2], as one script
const SET_INDEXED_NX: &str = r#"
if not redis.call('SET', KEYS[1], ARGV[1], 'NX', 'EX', ARGV[2]) then
    return 0
end
redis.call('SADD', KEYS[2], ARGV[3])
redis.call('EXPIRE', KEYS[2], ARGV[2])
return 1
"#;

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisPool {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_indexed(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        index_key: &str,
        member: &str,
    ) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;

        let written: i64 = Script::new(SET_INDEXED_NX)
            .key(key)
            .key(index_key)
            .arg(value)
            .arg(ttl_secs(ttl))
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        Ok(written == 1)
    }

    async fn delete_indexed(&self, key: &str, index_key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .del(key)
            .ignore()
            .srem(index_key, member)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_members(&self, index_key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let members: Vec<String> = conn.smembers(index_key).await?;
        Ok(members)
    }

    async fn set_remove(&self, index_key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: i64 = conn.srem(index_key, member).await?;
        Ok(())
    }

    /// Check if Redis is reachable
    async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// In-process [`KeyValueStore`]. A single lock guards the map, so the
/// indexed writes are atomic with respect to each other.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw string value, bypassing the indexed API
    pub async fn put_raw(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at,
            },
        );
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => match &entry.value {
                Value::Text(text) => Ok(Some(text.clone())),
                Value::Set(_) => Err(CacheError::Connection(format!(
                    "WRONGTYPE key {} holds a set",
                    key
                ))),
            },
            _ => Ok(None),
        }
    }

    async fn set_indexed(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        index_key: &str,
        member: &str,
    ) -> CacheResult<bool> {
        let now = Instant::now();
        let expires_at = now + ttl;
        let mut entries = self.entries.write().await;

        if entries.get(key).is_some_and(|entry| !entry.is_expired(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(expires_at),
            },
        );

        let index = entries
            .entry(index_key.to_string())
            .or_insert_with(|| Entry {
                value: Value::Set(HashSet::new()),
                expires_at: Some(expires_at),
            });
        if index.is_expired(now) {
            index.value = Value::Set(HashSet::new());
        }
        match &mut index.value {
            Value::Set(members) => {
                members.insert(member.to_string());
            }
            Value::Text(_) => {
                return Err(CacheError::Connection(format!(
                    "WRONGTYPE key {} holds a string",
                    index_key
                )));
            }
        }
        index.expires_at = Some(expires_at);

        Ok(true)
    }

    async fn delete_indexed(&self, key: &str, index_key: &str, member: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        if let Some(Entry {
            value: Value::Set(members),
            ..
        }) = entries.get_mut(index_key)
        {
            members.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, index_key: &str) -> CacheResult<Vec<String>> {
        let entries = self.entries.read().await;
        match entries.get(index_key) {
            Some(entry) if !entry.is_expired(Instant::now()) => match &entry.value {
                Value::Set(members) => Ok(members.iter().cloned().collect()),
                Value::Text(_) => Err(CacheError::Connection(format!(
                    "WRONGTYPE key {} holds a string",
                    index_key
                ))),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn set_remove(&self, index_key: &str, member: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(Entry {
            value: Value::Set(members),
            ..
        }) = entries.get_mut(index_key)
        {
            members.remove(member);
        }
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }
}
