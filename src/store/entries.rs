use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct Entry {
    value: String,
    expires_at_ms: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_ms
            .is_some_and(|expires_at_ms| expires_at_ms <= now.timestamp_millis())
    }
}

/// The key/value map shared by all store backends
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Entries {
    entries: HashMap<String, Entry>,
}

impl Entries {
    pub fn new_empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<&str> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.as_str())
    }

    pub fn set(&mut self, key: &str, value: String, expires_at: Option<DateTime<Utc>>) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at_ms: expires_at.map(|expires_at| expires_at.timestamp_millis()),
            },
        );
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Returns the number of removed entries
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let len_before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        len_before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
