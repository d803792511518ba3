use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{KeyValueBackend, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

/// Process-local backend with per-key expiry.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryBackend {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut guard = self.lock()?;
        match guard.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(Some(entry.value.clone())),
            Some(_) => {
                guard.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
