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

//! In-memory document store with lexical ranking

use super::{DocumentStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Documents ranked by token overlap with the query.
///
/// Ties keep insertion order. Documents sharing no token with the query are
/// never returned.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    name: String,
    documents: RwLock<Vec<(String, HashSet<String>)>>,
}

impl InMemoryDocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Create a store holding the given documents
    pub fn with_documents<I, S>(name: impl Into<String>, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new(name);
        for document in documents {
            store.insert(document);
        }
        store
    }

    /// Load a JSON array of document strings
    pub fn from_json_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let documents: Vec<String> = serde_json::from_str(&raw)?;

        let store = Self::with_documents(name, documents);
        info!("Loaded {} documents into '{}' from {}", store.len(), store.name, path.display());
        Ok(store)
    }

    pub fn insert(&self, document: impl Into<String>) {
        let document = document.into();
        let tokens = tokenize(&document);
        self.documents.write().push((document, tokens));
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>, StoreError> {
        let query_tokens = tokenize(text);
        let documents = self.documents.read();

        let mut scored: Vec<(usize, usize)> = documents
            .iter()
            .enumerate()
            .map(|(index, (_, tokens))| (index, tokens.intersection(&query_tokens).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored.into_iter().take(top_k).map(|(index, _)| documents[index].0.clone()).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|token| !token.is_empty()).map(str::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_query_ranks_by_overlap() {
        let store = InMemoryDocumentStore::with_documents(
            "rules",
            [
                "Prevention: check files exist before opening",
                "ZeroDivisionError happens on division by zero.\nPrevention: check the divisor",
                "Unrelated text",
            ],
        );

        let results = store.query("ZeroDivisionError Possible division by zero", 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].starts_with("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryDocumentStore::with_documents("rules", ["alpha one", "alpha two", "alpha three"]);
        let results = store.query("alpha", 2).await.unwrap();
        assert_eq!(results, vec!["alpha one".to_string(), "alpha two".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_store_misses() {
        let store = InMemoryDocumentStore::new("community");
        assert!(store.query("anything", 1).await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["Prevention: a", "Prevention: b"]"#).unwrap();

        let store = InMemoryDocumentStore::from_json_file("rules", file.path()).unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.name(), "rules");
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = InMemoryDocumentStore::from_json_file("rules", file.path());
        assert!(matches!(result, Err(StoreError::SerdeJson(_))));
    }
}
