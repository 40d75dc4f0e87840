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

//! HTTP client for a Chroma-compatible vector store

use super::{DocumentStore, StoreError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const COLLECTIONS_ENDPOINT: &str = "api/v1/collections";

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
}

/// A named collection on a remote vector store
#[derive(Debug)]
pub struct ChromaDocumentStore {
    base_url: Url,
    collection: String,
    client: Client,
    collection_id: OnceCell<String>,
}

impl ChromaDocumentStore {
    pub fn new(base_url_str: &str, collection: impl Into<String>) -> Result<Self, StoreError> {
        let mut base_url = Url::parse(base_url_str)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(DEFAULT_TIMEOUT_DURATION).build()?;

        Ok(Self {
            base_url,
            collection: collection.into(),
            client,
            collection_id: OnceCell::new(),
        })
    }

    /// Resolve and cache the collection id
    async fn collection_id(&self) -> Result<&str, StoreError> {
        let id = self.collection_id.get_or_try_init(|| self.fetch_collection_id()).await?;
        Ok(id.as_str())
    }

    async fn fetch_collection_id(&self) -> Result<String, StoreError> {
        let url = self.base_url.join(&format!("{COLLECTIONS_ENDPOINT}/{}", self.collection))?;
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionMissing {
                collection: self.collection.clone(),
            });
        }
        if !response.status().is_success() {
            return Err(StoreError::Unavailable {
                message: format!("HTTP {} - {}", response.status().as_u16(), response.text().await.unwrap_or_default()),
            });
        }

        let info: CollectionInfo = response.json().await?;
        debug!("Resolved collection '{}' to id {}", self.collection, info.id);
        Ok(info.id)
    }
}

#[async_trait]
impl DocumentStore for ChromaDocumentStore {
    fn name(&self) -> String {
        self.collection.clone()
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>, StoreError> {
        let id = self.collection_id().await?;
        let url = self.base_url.join(&format!("{COLLECTIONS_ENDPOINT}/{id}/query"))?;

        let body = json!({
            "query_texts": [text],
            "n_results": top_k,
            "include": ["documents"],
        });

        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::QueryFailed {
                message: format!("HTTP {} - {}", response.status().as_u16(), response.text().await.unwrap_or_default()),
            });
        }

        let result: QueryResponse = response.json().await?;
        Ok(result.documents.into_iter().next().unwrap_or_default().into_iter().flatten().take(top_k).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let id = self.collection_id().await?;
        let url = self.base_url.join(&format!("{COLLECTIONS_ENDPOINT}/{id}/count"))?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::QueryFailed {
                message: format!("HTTP {} - {}", response.status().as_u16(), response.text().await.unwrap_or_default()),
            });
        }

        Ok(response.json::<usize>().await?)
    }
}
