//! TTL-bounded in-memory key-value store.
//!
//! Keys map to JSON blobs (stored as serialized strings) with a per-entry
//! time-to-live. The store is not durable across process restarts; it exists
//! to outlive individual socket lifetimes and cover the client reconnect
//! window. Safe for interleaved access from request handlers and the
//! background sweeper.

use std::{
    collections::BTreeMap,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Default entry time-to-live: 20 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(20 * 60);

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory store backed by `BTreeMap` so prefix scans are range queries.
#[derive(Debug, Default)]
pub struct KvStore {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl KvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the blob stored under `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store `value` under `key` with the given time-to-live, replacing any
    /// previous entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = Entry {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().unwrap().insert(key.into(), entry);
    }

    /// Remove the entry under `key`. Returns whether one was present.
    pub fn del(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    /// List all live keys starting with `prefix`.
    ///
    /// Keys come back in lexicographic order as a side effect of the
    /// `BTreeMap` backing; callers that need a numeric order still sort by
    /// the sequence number embedded in the key.
    pub fn list(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap();
        entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| e.expires_at > now)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Drop all expired entries. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("pruned {removed} expired entries");
        }
        removed
    }

    /// Number of entries, including not-yet-pruned expired ones.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
