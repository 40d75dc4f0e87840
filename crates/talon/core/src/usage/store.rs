// Talon
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Usage counter storage

use super::UsageKey;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Usage store errors
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Per-key request counters.
///
/// `increment_if_below` is a critical section per key: concurrent callers on
/// the same key observe a serialized sequence of counts.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Increment the counter unless it already reached `limit`.
    ///
    /// Returns the new count, or `None` when the limit was reached and the
    /// counter was left untouched.
    async fn increment_if_below(&self, key: &UsageKey, limit: u32) -> Result<Option<u32>, UsageError>;

    /// Current count for a key, zero when unseen
    async fn current(&self, key: &UsageKey) -> Result<u32, UsageError>;
}

/// Process-lifetime counters; a restart resets every quota
#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    counts: DashMap<UsageKey, u32>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn increment_if_below(&self, key: &UsageKey, limit: u32) -> Result<Option<u32>, UsageError> {
        // The entry guard holds the shard lock for the whole check-and-increment
        let mut entry = self.counts.entry(key.clone()).or_insert(0);
        if *entry >= limit {
            return Ok(None);
        }
        *entry += 1;
        Ok(Some(*entry))
    }

    async fn current(&self, key: &UsageKey) -> Result<u32, UsageError> {
        Ok(self.counts.get(key).map(|count| *count).unwrap_or(0))
    }
}

/// Counters persisted to a JSON file after every increment.
///
/// The async lock is held across the write so disk order matches count order.
#[derive(Debug)]
pub struct FileUsageStore {
    path: PathBuf,
    counts: Mutex<HashMap<String, u32>>,
}

impl FileUsageStore {
    /// Open a store, loading existing counters when the file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, UsageError> {
        let path = path.as_ref().to_path_buf();

        let counts = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() { HashMap::new() } else { serde_json::from_str(&raw)? }
        } else {
            HashMap::new()
        };

        info!("Opened usage store at {} with {} counters", path.display(), counts.len());

        Ok(Self {
            path,
            counts: Mutex::new(counts),
        })
    }

    async fn persist(&self, counts: &HashMap<String, u32>) -> Result<(), UsageError> {
        let json = serde_json::to_string(counts)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Persisted {} usage counters", counts.len());
        Ok(())
    }
}

#[async_trait]
impl UsageStore for FileUsageStore {
    async fn increment_if_below(&self, key: &UsageKey, limit: u32) -> Result<Option<u32>, UsageError> {
        let storage_key = key.to_string();
        let mut counts = self.counts.lock().await;

        let current = counts.get(&storage_key).copied().unwrap_or(0);
        if current >= limit {
            return Ok(None);
        }

        counts.insert(storage_key.clone(), current + 1);
        if let Err(e) = self.persist(&counts).await {
            // Keep memory and disk in agreement
            counts.insert(storage_key, current);
            return Err(e);
        }

        Ok(Some(current + 1))
    }

    async fn current(&self, key: &UsageKey) -> Result<u32, UsageError> {
        Ok(self.counts.lock().await.get(&key.to_string()).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(user: &str) -> UsageKey {
        UsageKey::new(user, "2025-06")
    }

    #[tokio::test]
    async fn test_in_memory_increments_until_limit() {
        let store = InMemoryUsageStore::new();
        assert_eq!(store.increment_if_below(&key("a"), 2).await.unwrap(), Some(1));
        assert_eq!(store.increment_if_below(&key("a"), 2).await.unwrap(), Some(2));
        assert_eq!(store.increment_if_below(&key("a"), 2).await.unwrap(), None);
        assert_eq!(store.current(&key("a")).await.unwrap(), 2);
        assert_eq!(store.current(&key("b")).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_memory_concurrent_boundary() {
        let store = Arc::new(InMemoryUsageStore::new());

        let handles: Vec<_> = (0..150)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_if_below(&key("shared"), 100).await.unwrap() })
            })
            .collect();

        let mut accepted = Vec::new();
        for handle in handles {
            if let Some(count) = handle.await.unwrap() {
                accepted.push(count);
            }
        }

        accepted.sort();
        assert_eq!(accepted, (1..=100).collect::<Vec<u32>>());
        assert_eq!(store.current(&key("shared")).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");

        {
            let store = FileUsageStore::open(&path).unwrap();
            assert_eq!(store.increment_if_below(&key("a"), 100).await.unwrap(), Some(1));
            assert_eq!(store.increment_if_below(&key("a"), 100).await.unwrap(), Some(2));
        }

        let reopened = FileUsageStore::open(&path).unwrap();
        assert_eq!(reopened.current(&key("a")).await.unwrap(), 2);
        assert_eq!(reopened.increment_if_below(&key("a"), 3).await.unwrap(), Some(3));
        assert_eq!(reopened.increment_if_below(&key("a"), 3).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_store_concurrent_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        let store = Arc::new(FileUsageStore::open(&path).unwrap());

        let handles: Vec<_> = (0..30)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_if_below(&key("shared"), 20).await.unwrap() })
            })
            .collect();

        let mut accepted = Vec::new();
        for handle in handles {
            if let Some(count) = handle.await.unwrap() {
                accepted.push(count);
            }
        }

        accepted.sort();
        assert_eq!(accepted, (1..=20).collect::<Vec<u32>>());

        let on_disk: HashMap<String, u32> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.get(&key("shared").to_string()), Some(&20));
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(FileUsageStore::open(&path), Err(UsageError::SerdeJson(_))));
    }

    #[tokio::test]
    async fn test_file_store_write_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("usage.json");

        let store = FileUsageStore::open(&path).unwrap();
        assert!(store.increment_if_below(&key("a"), 100).await.is_err());
        assert_eq!(store.current(&key("a")).await.unwrap(), 0);
    }
}
