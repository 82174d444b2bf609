// src/cache.rs

//! Local fallback cache.
//!
//! Holds the last known schedules and per-student progress so eligibility
//! and progress reads keep working while the record store is unreachable.

use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::{Map, Value};
use tokio::sync::watch;

type Entries = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    BatchSchedules,
    SubjectSchedules(i64),
    Progress(String),

    /// Attempts of one student that never reached the store.
    Unsynced(String),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::BatchSchedules => f.write_str("batchSchedules"),
            CacheKey::SubjectSchedules(id) => write!(f, "subjectSchedules:{}", id),
            CacheKey::Progress(student) => write!(f, "progress:{}", student),
            CacheKey::Unsynced(student) => write!(f, "unsynced:{}", student),
        }
    }
}

pub trait LocalCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Value>;

    fn set(&self, key: &CacheKey, value: Value);

    /// Shallow-merges the fields of `patch` into the object stored under
    /// `key`. A missing or non-object entry is replaced by `patch`.
    fn merge(&self, key: &CacheKey, patch: Value);
}

pub type SharedCache = Arc<dyn LocalCache>;

/// In-process cache, optionally mirrored to a JSON file.
///
/// Changes never touch the disk themselves: each one publishes a snapshot
/// that a background task writes out, skipping snapshots superseded before
/// it got to them.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<Entries>,
    snapshots: Option<watch::Sender<Entries>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads previous entries from `path` if it holds a JSON object and
    /// starts the writer task. Must be called inside a Tokio runtime.
    pub async fn persistent(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<Entries>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                    Entries::new()
                }
            },
            Err(_) => Entries::new(),
        };

        let (snapshots, rx) = watch::channel(entries.clone());
        tokio::spawn(write_snapshots(path, rx));

        Self {
            entries: RwLock::new(entries),
            snapshots: Some(snapshots),
        }
    }

    fn publish(&self, entries: &Entries) {
        if let Some(snapshots) = &self.snapshots {
            snapshots.send_replace(entries.clone());
        }
    }
}

/// Writes the newest snapshot through a temp file and a rename. Ends when
/// the cache is dropped.
async fn write_snapshots(path: PathBuf, mut rx: watch::Receiver<Entries>) {
    let tmp = path.with_extension("json.tmp");
    while rx.changed().await.is_ok() {
        let body = serde_json::to_vec(&*rx.borrow_and_update());
        let written = match body {
            Ok(body) => match tokio::fs::write(&tmp, body).await {
                Ok(()) => tokio::fs::rename(&tmp, &path).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = written {
            tracing::warn!("Failed to write cache file {}: {}", path.display(), e);
        }
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&key.to_string()).cloned()
    }

    fn set(&self, key: &CacheKey, value: Value) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        self.publish(&entries);
    }

    fn merge(&self, key: &CacheKey, patch: Value) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let merged = match (entries.remove(&key.to_string()), patch) {
            (Some(Value::Object(mut current)), Value::Object(patch)) => {
                current.extend(patch);
                Value::Object(current)
            }
            (_, patch) => patch,
        };
        entries.insert(key.to_string(), merged);
        self.publish(&entries);
    }
}

/// Reads a cached entry as a JSON object, empty when absent.
pub fn object_entry(cache: &dyn LocalCache, key: &CacheKey) -> Map<String, Value> {
    match cache.get(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_shallow() {
        let cache = MemoryCache::new();
        let key = CacheKey::Progress("sv1".into());

        cache.merge(&key, json!({ "1": { "attempts": 1 } }));
        cache.merge(&key, json!({ "2": { "attempts": 4 } }));
        cache.merge(&key, json!({ "1": { "passed": true } }));

        assert_eq!(
            cache.get(&key),
            Some(json!({ "1": { "passed": true }, "2": { "attempts": 4 } }))
        );
    }

    #[test]
    fn keys_are_independent() {
        let cache = MemoryCache::new();
        cache.set(&CacheKey::SubjectSchedules(1), json!([1]));
        assert_eq!(cache.get(&CacheKey::SubjectSchedules(2)), None);
        assert_eq!(cache.get(&CacheKey::SubjectSchedules(1)), Some(json!([1])));
        assert_eq!(CacheKey::Progress("a".into()).to_string(), "progress:a");
    }

    #[tokio::test]
    async fn persistent_cache_reloads() {
        let path = std::env::temp_dir().join(format!("quiz-cache-{}.json", uuid::Uuid::new_v4()));

        let cache = MemoryCache::persistent(&path).await;
        cache.set(&CacheKey::BatchSchedules, json!([]));
        cache.set(&CacheKey::SubjectSchedules(1), json!([1]));

        // The writer task runs in the background.
        let mut written = Entries::new();
        for _ in 0..200 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if let Ok(raw) = tokio::fs::read(&path).await {
                written = serde_json::from_slice(&raw).unwrap();
                if written.len() == 2 {
                    break;
                }
            }
        }
        assert_eq!(written.len(), 2);

        let reloaded = MemoryCache::persistent(&path).await;
        assert_eq!(reloaded.get(&CacheKey::BatchSchedules), Some(json!([])));
        assert_eq!(reloaded.get(&CacheKey::SubjectSchedules(1)), Some(json!([1])));
        assert!(!path.with_extension("json.tmp").exists());

        tokio::fs::remove_file(&path).await.ok();
    }
}
