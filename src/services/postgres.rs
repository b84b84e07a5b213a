use async_trait::async_trait;
use lru::LruCache;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::StoreError;
use crate::services::traits::ProcessedEventStore;

const DEFAULT_CACHE_SIZE: usize = 1024;

/// Processed-event store backed by PostgreSQL.
///
/// Lookups hit an in-process LRU of known-processed identifiers before
/// querying the database; only positive answers are cached since a
/// processed event never becomes unprocessed.
pub struct PostgresEventStore {
    pool: PgPool,
    cache: Mutex<LruCache<String, ()>>,
}

impl PostgresEventStore {
    /// Connect and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Processed-event store connected to PostgreSQL");

        Ok(Self::with_pool(pool, DEFAULT_CACHE_SIZE))
    }

    pub fn with_pool(pool: PgPool, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            pool,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cached(&self, event_id: &str) -> bool {
        self.cache
            .lock()
            .map(|mut cache| cache.get(event_id).is_some())
            .unwrap_or(false)
    }

    fn remember(&self, event_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(event_id.to_string(), ());
        }
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresEventStore {
    async fn has(&self, event_id: &str) -> Result<bool, StoreError> {
        if self.cached(event_id) {
            return Ok(true);
        }

        let found = sqlx::query("SELECT 1 FROM processed_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if found {
            self.remember(event_id);
        }
        Ok(found)
    }

    /// INSERT ... ON CONFLICT keeps the first processing time and makes repeats a no-op
    async fn mark(&self, event_id: &str) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO processed_events (event_id, processed_at)
            VALUES ($1, NOW())
            ON CONFLICT (event_id) DO NOTHING
        "#;

        sqlx::query(query).bind(event_id).execute(&self.pool).await?;
        self.remember(event_id);

        tracing::debug!("Marked event processed: {}", event_id);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
