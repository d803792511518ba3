use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::OnceCell;

use super::{KeyValueBackend, StoreError};

/// Redis-backed store. The connection is opened on first use and retried on
/// the next call if that fails; every call is bounded by `timeout`.
pub struct RedisBackend {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisBackend {
    /// Parses the URL without touching the network.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            manager: OnceCell::new(),
            timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.manager
            .get_or_try_init(|| bounded(self.timeout, self.client.get_connection_manager()))
            .await
            .cloned()
    }
}

async fn bounded<T, F>(timeout: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = redis::RedisResult<T>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .map_err(|_| StoreError::Timeout(timeout))?
        .map_err(StoreError::from)
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        bounded(self.timeout, conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(ttl) => {
                bounded(
                    self.timeout,
                    conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)),
                )
                .await
            }
            None => bounded(self.timeout, conn.set::<_, _, ()>(key, value)).await,
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = bounded(
            self.timeout,
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await?;
        Ok(())
    }
}
