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

//! Ranked document stores queried by the suggestion enricher

pub mod chroma;
pub mod memory;

pub use chroma::ChromaDocumentStore;
pub use memory::InMemoryDocumentStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Document store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection '{collection}' does not exist")]
    CollectionMissing { collection: String },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Query failed: {message}")]
    QueryFailed { message: String },

    #[error("Request to '{collection}' timed out after {millis}ms")]
    Timeout { collection: String, millis: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid store URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// A semantic text collection ranked nearest-first
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Collection name, used in logs and health output
    fn name(&self) -> String;

    /// Return up to `top_k` document texts, nearest first
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>, StoreError>;

    /// Number of documents held by the collection
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Bound applied to document counts in health and startup reporting
pub const COUNT_TIMEOUT: Duration = Duration::from_secs(2);

/// Query a store, failing with [`StoreError::Timeout`] once `limit` elapses
pub async fn query_within(store: &dyn DocumentStore, text: &str, top_k: usize, limit: Duration) -> Result<Vec<String>, StoreError> {
    tokio::time::timeout(limit, store.query(text, top_k)).await.map_err(|_| timed_out(store, limit))?
}

/// Count a store's documents, failing with [`StoreError::Timeout`] once `limit` elapses
pub async fn count_within(store: &dyn DocumentStore, limit: Duration) -> Result<usize, StoreError> {
    tokio::time::timeout(limit, store.count()).await.map_err(|_| timed_out(store, limit))?
}

fn timed_out(store: &dyn DocumentStore, limit: Duration) -> StoreError {
    StoreError::Timeout {
        collection: store.name(),
        millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        fn name(&self) -> String {
            "stalled".to_string()
        }

        async fn query(&self, _text: &str, _top_k: usize) -> Result<Vec<String>, StoreError> {
            std::future::pending().await
        }

        async fn count(&self) -> Result<usize, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_expired_requests_report_timeout() {
        let limit = Duration::from_millis(20);

        let err = query_within(&StalledStore, "anything", 1, limit).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout { ref collection, millis: 20 } if collection == "stalled"));
        assert_eq!(err.to_string(), "Request to 'stalled' timed out after 20ms");

        let err = count_within(&StalledStore, limit).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout { millis: 20, .. }));
    }

    #[tokio::test]
    async fn test_prompt_requests_pass_through() {
        let store = InMemoryDocumentStore::with_documents("rules", ["NameError\nPrevention: define it"]);
        let limit = Duration::from_secs(1);

        assert_eq!(count_within(&store, limit).await.unwrap(), 1);
        assert_eq!(query_within(&store, "NameError", 1, limit).await.unwrap().len(), 1);
    }
}
