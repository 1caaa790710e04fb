use async_trait::async_trait;
use moka::Expiry;
use redis::aio::ConnectionManager;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::CacheSettings;
use crate::models::{Address, PredictedProperty, PredictionRequest};

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Cache key for a prediction
///
/// Built from the request's structural attributes and the *resolved*
/// neighborhood, so two zip codes in the same neighborhood share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(request: &PredictionRequest, address: &Address) -> Self {
        Self(format!(
            "rooms:{}-bathrooms:{}-parking_space:{}-size:{}-neighborhood:{}",
            request.rooms,
            request.bathrooms,
            request.parking_space,
            request.size,
            address.neighborhood_name
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key-value store with native expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry, for `ttl`
    async fn set_ex(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError>;

    /// Value together with its remaining lifetime
    ///
    /// `None` for the lifetime means the store keeps the entry without expiry
    /// or cannot tell.
    async fn get_with_ttl(&self, key: &str) -> Result<Option<(String, Option<Duration>)>, CacheError> {
        Ok(self.get(key).await?.map(|value| (value, None)))
    }
}

/// Redis-backed store using `SETEX` / `GET`
pub struct RedisStore {
    // Store ConnectionManager in a Mutex for interior mutability
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
        })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError> {
        let mut conn = self.redis.lock().await;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<(String, Option<Duration>)>, CacheError> {
        let mut conn = self.redis.lock().await;
        let (value, pttl): (Option<String>, i64) = redis::pipe()
            .cmd("GET")
            .arg(key)
            .cmd("PTTL")
            .arg(key)
            .query_async(&mut *conn)
            .await?;

        // PTTL: -1 no expiry, -2 gone (expired between the two commands)
        let remaining = match pttl {
            -1 => None,
            ms if ms > 0 => Some(Duration::from_millis(ms as u64)),
            _ => Some(Duration::ZERO),
        };
        Ok(value.map(|value| (value, remaining)))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expiry that honours the TTL given on each write
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process store backed by moka
pub struct MemoryStore {
    entries: moka::future::Cache<String, Entry>,
}

impl MemoryStore {
    pub fn new(capacity: u64) -> Self {
        let entries = moka::future::Cache::builder()
            .max_capacity(capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries }
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), Entry { value, ttl }).await;
        Ok(())
    }
}

/// L1 (in-memory) in front of L2 (Redis)
///
/// L1 is fastest but local to the process, L2 is shared across instances.
/// L2 hits are copied into L1 for at most `l1_ttl`, and never for longer than
/// L2 still holds the entry.
pub struct TieredStore {
    l1: MemoryStore,
    l2: Box<dyn CacheStore>,
    l1_ttl: Duration,
}

impl TieredStore {
    pub fn new(l1: MemoryStore, l2: impl CacheStore + 'static, l1_ttl: Duration) -> Self {
        Self {
            l1,
            l2: Box::new(l2),
            l1_ttl,
        }
    }
}

#[async_trait]
impl CacheStore for TieredStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(value) = self.l1.get(key).await? {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(value));
        }

        let Some((value, remaining)) = self.l2.get_with_ttl(key).await? else {
            return Ok(None);
        };
        tracing::trace!("L2 cache hit: {}", key);

        let l1_ttl = remaining.map_or(self.l1_ttl, |remaining| remaining.min(self.l1_ttl));
        if !l1_ttl.is_zero() {
            self.l1.set_ex(key, l1_ttl, value.clone()).await?;
        }
        Ok(Some(value))
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: String) -> Result<(), CacheError> {
        self.l1.set_ex(key, ttl.min(self.l1_ttl), value.clone()).await?;
        self.l2.set_ex(key, ttl, value).await
    }
}

/// Fingerprint-keyed cache of price predictions
///
/// Never fails its caller: store errors are logged and read as a miss.
#[derive(Clone)]
pub struct PredictionCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl PredictionCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Build the cache described by the settings
    ///
    /// With a Redis URL the cache is tiered; if Redis cannot be reached the
    /// cache runs in process only.
    pub async fn from_settings(settings: &CacheSettings) -> Self {
        let ttl = settings.ttl();
        let l1 = MemoryStore::new(settings.l1_cache_size.unwrap_or(1000));

        let store: Arc<dyn CacheStore> = match &settings.redis_url {
            Some(url) => match RedisStore::new(url).await {
                Ok(l2) => {
                    tracing::info!("Prediction cache using Redis (TTL: {}s)", ttl.as_secs());
                    Arc::new(TieredStore::new(l1, l2, ttl))
                }
                Err(e) => {
                    tracing::warn!("Failed to connect to Redis ({}), caching in process only", e);
                    Arc::new(l1)
                }
            },
            None => Arc::new(l1),
        };

        Self::new(store, ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<PredictedProperty> {
        tracing::info!("Checking cache");

        let raw = match self.store.get(fingerprint.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::trace!("Cache miss: {}", fingerprint);
                return None;
            }
            Err(e) => {
                tracing::error!("Error on cache get: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                tracing::error!("Discarding unreadable cache entry {}: {}", fingerprint, e);
                None
            }
        }
    }

    /// Store a prediction; returns whether the write went through
    pub async fn put(&self, fingerprint: &Fingerprint, prediction: &PredictedProperty) -> bool {
        let result = match serde_json::to_string(prediction) {
            Ok(json) => self.store.set_ex(fingerprint.as_str(), self.ttl, json).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                tracing::trace!("Cache set: {}", fingerprint);
                true
            }
            Err(e) => {
                tracing::error!("Error on cache put: {}", e);
                false
            }
        }
    }
}
