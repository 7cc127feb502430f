use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

use super::{entries::Entries, KeyValueStore};
use crate::clock::{Clock, SystemClock};

/// Store that only lives as long as the process
pub struct InMemoryStore {
    entries: Mutex<Entries>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(Entries::new_empty()),
            clock,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key, self.clock.now()).map(str::to_string))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.purge_expired(self.clock.now());
        entries.set(key, value, None);
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let expires_at = now + ChronoDuration::from_std(ttl)?;
        let mut entries = self.entries.lock().await;
        entries.purge_expired(now);
        entries.set(key, value, Some(expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.delete(key);
        Ok(())
    }
}
