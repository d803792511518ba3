//! Key-value store adapter.
//!
//! Two operation families sit on top of a [`KeyValueBackend`]:
//! durable `get`/`set`, retried under a [`RetryPolicy`] with the last error
//! propagated; and best-effort `cache_get`/`cache_set`, which log failures
//! and degrade to a miss or a no-op.

mod memory;
mod redis_backend;
mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;

pub use memory::InMemoryBackend;
pub use redis_backend::RedisBackend;
pub use retry::{retry, RetryPolicy};

/// Interests written by [`Store::seed_interests`].
pub const DEMO_INTERESTS: [&str; 11] = [
    "cars", "pets", "travel", "hi-tech", "sport", "music", "books", "tv", "cinema", "geek", "otus",
];

/// Raw storage operations; values are strings, expiry is optional.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
    #[error("malformed value under key '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
}

/// Shared store handle injected into the dispatcher at startup.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KeyValueBackend>,
    retry: RetryPolicy,
}

impl Store {
    pub fn new(backend: Arc<dyn KeyValueBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::default()), RetryPolicy::default())
    }

    /// Builds the backend named by the configuration. Redis is reached
    /// lazily, so an unreachable server only degrades the calls that need it.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_delay);
        match &config.url {
            Some(url) => {
                let backend = RedisBackend::new(url, config.timeout)?;
                info!("using redis store");
                Ok(Self::new(Arc::new(backend), retry))
            }
            None => {
                info!("no STORE_URL configured, using in-memory store");
                Ok(Self::new(Arc::new(InMemoryBackend::default()), retry))
            }
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.backend.ping().await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        retry(self.retry, "get", || self.backend.get(key)).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        retry(self.retry, "set", || self.backend.set(key, value, ttl)).await?;
        Ok(true)
    }

    pub async fn cache_get(&self, key: &str) -> Option<String> {
        debug!(key, "reading value from cache");
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn cache_set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        debug!(key, "writing value to cache");
        if let Err(err) = self.backend.set(key, value, ttl).await {
            warn!(key, error = %err, "cache write failed, skipping");
        }
    }

    /// Writes the demo interest lists under `i:1` ..= `i:11`.
    pub async fn seed_interests(&self) -> Result<usize, StoreError> {
        let total = DEMO_INTERESTS.len();
        for (index, interest) in DEMO_INTERESTS.iter().enumerate() {
            let neighbour = DEMO_INTERESTS[(index + 1) % total];
            let value = serde_json::json!([interest, neighbour]).to_string();
            self.set(&format!("i:{}", index + 1), &value, None).await?;
        }
        info!(total, "seeded client interests");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then delegates to memory.
    #[derive(Default)]
    struct FlakyBackend {
        failures: usize,
        calls: AtomicUsize,
        inner: InMemoryBackend,
    }

    impl FlakyBackend {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }

        fn trip(&self) -> Result<(), StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(StoreError::Unavailable("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl KeyValueBackend for FlakyBackend {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.trip()?;
            self.inner.get(key).await
        }

        async fn set(
            &self,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<(), StoreError> {
            self.trip()?;
            self.inner.set(key, value, ttl).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.trip()
        }
    }

    fn store_with(backend: Arc<FlakyBackend>) -> Store {
        Store::new(backend, RetryPolicy::new(3, Duration::ZERO))
    }

    #[tokio::test]
    async fn durable_operations_recover_within_attempts() {
        let backend = Arc::new(FlakyBackend::failing(2));
        let store = store_with(backend.clone());

        assert!(store.set("name", "value", None).await.expect("third attempt succeeds"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            store.get("name").await.expect("get succeeds"),
            Some("value".to_string())
        );
    }

    #[tokio::test]
    async fn durable_operations_propagate_after_last_attempt() {
        let backend = Arc::new(FlakyBackend::failing(usize::MAX));
        let store = store_with(backend.clone());

        let err = store.get("name").await.expect_err("all attempts fail");
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cache_operations_swallow_failures() {
        let backend = Arc::new(FlakyBackend::failing(usize::MAX));
        let store = store_with(backend.clone());

        store.cache_set("uid:1", "3", None).await;
        assert_eq!(store.cache_get("uid:1").await, None);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2, "cache path never retries");
    }

    #[tokio::test]
    async fn seeding_writes_json_lists() {
        let store = Store::in_memory();
        assert_eq!(store.seed_interests().await.expect("seed"), 11);
        let raw = store.get("i:1").await.expect("get").expect("seeded");
        let interests: Vec<String> = serde_json::from_str(&raw).expect("json list");
        assert_eq!(interests, vec!["cars".to_string(), "pets".to_string()]);
        let last = store.get("i:11").await.expect("get").expect("seeded");
        assert_eq!(last, r#"["otus","cars"]"#);
    }

    #[tokio::test]
    async fn in_memory_store_from_config() {
        let store = Store::connect(&StoreConfig::default()).await.expect("in-memory");
        store.ping().await.expect("memory backend answers ping");
        assert_eq!(store.retry_policy(), RetryPolicy::default());
    }

    #[tokio::test]
    async fn unreachable_redis_degrades_cache_instead_of_failing_startup() {
        let config = StoreConfig {
            url: Some("redis://127.0.0.1:1/".to_string()),
            timeout: Duration::from_millis(500),
            retry_attempts: 2,
            retry_delay: Duration::ZERO,
        };
        let store = Store::connect(&config).await.expect("connect is lazy");

        assert!(store.ping().await.is_err());
        assert_eq!(store.cache_get("uid:abc").await, None);
        store.cache_set("uid:abc", "3", None).await;
        assert!(store.get("i:1").await.is_err());
    }
}
