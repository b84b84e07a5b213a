use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::error::{CollaboratorError, StoreError};
use crate::models::{Venue, VenueQuery};
use crate::services::traits::{MemoryPersistence, VenueSearch};

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Multi-tier cache manager
///
/// Implements L1 (in-memory) and optional L2 (Redis) caching.
/// L1 is fastest but limited in size, L2 is shared across instances
/// and survives restarts.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Create a cache manager; without a Redis URL only the L1 tier is used
    pub async fn new(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let redis = match redis_url {
            Some(url) => {
                let client = redis::Client::open(url)?;
                let conn = ConnectionManager::new(client).await?;
                Some(Arc::new(tokio::sync::Mutex::new(conn)))
            }
            None => None,
        };

        Ok(Self {
            redis,
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        })
    }

    /// Process-local cache only
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self {
            redis: None,
            l1_cache: Self::build_l1(l1_size, ttl_secs),
            ttl_secs,
        }
    }

    fn build_l1(l1_size: u64, ttl_secs: u64) -> moka::future::Cache<String, Vec<u8>> {
        moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build()
    }

    pub fn has_l2(&self) -> bool {
        self.redis.is_some()
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);
                self.l1_cache
                    .insert(key.to_string(), json.as_bytes().to_vec())
                    .await;
                return Ok(serde_json::from_str(&json)?);
            }
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in both tiers, expiring after the configured TTL
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;
        self.l1_cache
            .insert(key.to_string(), json.as_bytes().to_vec())
            .await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Set a value in L2 without expiry; L1 still evicts on its own schedule
    pub async fn set_persistent<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;
        self.l1_cache
            .insert(key.to_string(), json.as_bytes().to_vec())
            .await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SET")
                .arg(key)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        Ok(())
    }

    /// Delete a value from both cache tiers
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("DEL").arg(key).query_async::<()>(&mut *conn).await?;
        }
        Ok(())
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a venue search
    pub fn venues(query: &VenueQuery) -> String {
        query.cache_key()
    }

    /// Build a cache key for the persisted session memory
    pub fn session_memory(namespace: &str) -> String {
        format!("memory:{}", namespace)
    }
}

/// Venue search decorator that serves repeated queries from the cache.
///
/// Empty results are not cached so a transient upstream gap is retried on
/// the next event.
pub struct CachingVenueSearch {
    inner: Arc<dyn VenueSearch>,
    cache: Arc<CacheManager>,
}

impl CachingVenueSearch {
    pub fn new(inner: Arc<dyn VenueSearch>, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl VenueSearch for CachingVenueSearch {
    async fn search(&self, query: &VenueQuery) -> Result<Vec<Venue>, CollaboratorError> {
        let key = CacheKey::venues(query);

        match self.cache.get::<Vec<Venue>>(&key).await {
            Ok(venues) => return Ok(venues),
            Err(CacheError::CacheMiss(_)) => {}
            Err(e) => tracing::warn!("Venue cache read failed: {}", e),
        }

        let venues = self.inner.search(query).await?;

        if !venues.is_empty() {
            if let Err(e) = self.cache.set(&key, &venues).await {
                tracing::warn!("Venue cache write failed: {}", e);
            }
        }

        Ok(venues)
    }
}

/// Session memory window kept under a single cache key
pub struct RedisMemoryPersistence {
    cache: Arc<CacheManager>,
    key: String,
}

impl RedisMemoryPersistence {
    pub fn new(cache: Arc<CacheManager>, namespace: &str) -> Self {
        Self {
            cache,
            key: CacheKey::session_memory(namespace),
        }
    }
}

#[async_trait]
impl MemoryPersistence for RedisMemoryPersistence {
    async fn load(&self) -> Result<Vec<String>, StoreError> {
        match self.cache.get::<Vec<String>>(&self.key).await {
            Ok(entries) => Ok(entries),
            Err(CacheError::CacheMiss(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &[String]) -> Result<(), StoreError> {
        self.cache.set_persistent(&self.key, &entries).await?;
        Ok(())
    }
}
