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

//! Retrieval-backed prevention suggestions
//!
//! Each finding is looked up in the curated rules collection first, then in the
//! community collection, then falls back to a generic tip. Store failures and
//! timeouts are logged and count as misses; enrichment never fails.

pub mod extract;

pub use extract::{MAX_PREVENTION_CHARS, community_prevention, extract_prevention, fallback_prevention};

use crate::finding::Finding;
use crate::store::{DocumentStore, StoreError, query_within};
use futures::stream::{self, StreamExt};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single store query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of findings enriched at once
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 8;

/// Attaches prevention text to findings
#[derive(Clone)]
pub struct SuggestionEnricher {
    primary: Option<Arc<dyn DocumentStore>>,
    secondary: Option<Arc<dyn DocumentStore>>,
    timeout: Duration,
    concurrency: usize,
}

impl SuggestionEnricher {
    /// Create an enricher over a curated store and a community store, either of which may be absent
    pub fn new(primary: Option<Arc<dyn DocumentStore>>, secondary: Option<Arc<dyn DocumentStore>>) -> Self {
        Self {
            primary,
            secondary,
            timeout: DEFAULT_QUERY_TIMEOUT,
            concurrency: DEFAULT_ENRICH_CONCURRENCY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap the findings enriched at once; zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn primary(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.secondary.as_ref()
    }

    /// Return the finding with its prevention text set
    pub async fn enrich(&self, finding: Finding) -> Finding {
        let prevention = self.prevention_for(&finding).await;
        finding.with_prevention(prevention)
    }

    /// Enrich findings with at most `concurrency` in flight, preserving order
    pub async fn enrich_all(&self, findings: Vec<Finding>) -> Vec<Finding> {
        stream::iter(findings).map(|finding| self.enrich(finding)).buffered(self.concurrency).collect().await
    }

    async fn prevention_for(&self, finding: &Finding) -> String {
        if let Some(store) = &self.primary {
            let query = format!("{} {}", finding.kind, finding.message);
            if let Some(text) = self.top_document(store.as_ref(), &query).await.as_deref().and_then(extract_prevention) {
                return text;
            }
        }

        if let Some(store) = &self.secondary {
            let query = format!("Python {} fix solution", finding.kind);
            if let Some(text) = self.top_document(store.as_ref(), &query).await.as_deref().and_then(community_prevention) {
                return text;
            }
        }

        debug!("No stored prevention for {} at line {}", finding.kind, finding.line);
        fallback_prevention(finding.kind)
    }

    /// Nearest document, with errors and timeouts treated as a miss
    async fn top_document(&self, store: &dyn DocumentStore, query: &str) -> Option<String> {
        match query_within(store, query, 1, self.timeout).await {
            Ok(documents) => documents.into_iter().next(),
            Err(e @ StoreError::Timeout { .. }) => {
                warn!("{}", e);
                counter!("talon_store_misses_total", 1);
                None
            }
            Err(e) => {
                warn!("Document store '{}' query failed: {}", store.name(), e);
                counter!("talon_store_misses_total", 1);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::ErrorKind;
    use crate::store::{InMemoryDocumentStore, MockDocumentStore, StoreError};
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn finding(kind: ErrorKind, message: &str) -> Finding {
        Finding {
            kind,
            message: message.to_string(),
            line: 0,
            column: 0,
            snippet: String::new(),
            prevention: None,
            subject: None,
        }
    }

    fn failing_store() -> Arc<dyn DocumentStore> {
        let mut store = MockDocumentStore::new();
        store.expect_query().returning(|_, _| {
            Err(StoreError::Unavailable {
                message: "connection refused".to_string(),
            })
        });
        store.expect_name().return_const("broken".to_string());
        Arc::new(store)
    }

    struct SlowStore;

    #[async_trait]
    impl DocumentStore for SlowStore {
        fn name(&self) -> String {
            "slow".to_string()
        }

        async fn query(&self, _text: &str, _top_k: usize) -> Result<Vec<String>, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec!["Prevention: too late".to_string()])
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_primary_store_prevention() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query()
            .with(eq("AttributeError 'None' has no attribute 'x'"), eq(1usize))
            .times(1)
            .returning(|_, _| Ok(vec!["AttributeError\nPrevention: avoid None access".to_string()]));

        let enricher = SuggestionEnricher::new(Some(Arc::new(store)), None);
        let enriched = enricher.enrich(finding(ErrorKind::Attribute, "'None' has no attribute 'x'")).await;
        assert_eq!(enriched.prevention.as_deref(), Some("avoid None access"));
    }

    #[tokio::test]
    async fn test_secondary_used_when_primary_has_no_marker() {
        let primary = InMemoryDocumentStore::with_documents("rules", ["TypeError notes without any marker"]);
        let mut secondary = MockDocumentStore::new();
        secondary
            .expect_query()
            .with(eq("Python TypeError fix solution"), eq(1usize))
            .returning(|_, _| Ok(vec!["Convert with str() before concatenating".to_string()]));

        let enricher = SuggestionEnricher::new(Some(Arc::new(primary)), Some(Arc::new(secondary)));
        let enriched = enricher.enrich(finding(ErrorKind::Type, "Cannot concatenate")).await;
        assert_eq!(
            enriched.prevention.as_deref(),
            Some("Based on Stack Overflow: Convert with str() before concatenating...")
        );
    }

    #[tokio::test]
    async fn test_both_stores_absent_uses_fallback() {
        let enricher = SuggestionEnricher::new(None, None);
        let findings = vec![finding(ErrorKind::Name, "'null' is not defined"), finding(ErrorKind::ZeroDivision, "Possible division by zero")];

        let enriched = enricher.enrich_all(findings).await;
        assert_eq!(enriched[0].prevention.as_deref(), Some(fallback_prevention(ErrorKind::Name).as_str()));
        assert_eq!(enriched[1].prevention.as_deref(), Some(fallback_prevention(ErrorKind::ZeroDivision).as_str()));
    }

    #[tokio::test]
    async fn test_store_errors_are_misses() {
        let enricher = SuggestionEnricher::new(Some(failing_store()), Some(failing_store()));
        let enriched = enricher.enrich(finding(ErrorKind::FileNotFound, "File 'a' might not exist")).await;
        assert_eq!(enriched.prevention, Some(fallback_prevention(ErrorKind::FileNotFound)));
    }

    #[tokio::test]
    async fn test_empty_stores_are_misses() {
        let enricher = SuggestionEnricher::new(
            Some(Arc::new(InMemoryDocumentStore::new("rules"))),
            Some(Arc::new(InMemoryDocumentStore::new("community"))),
        );
        let enriched = enricher.enrich(finding(ErrorKind::Type, "x")).await;
        assert_eq!(enriched.prevention, Some(fallback_prevention(ErrorKind::Type)));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let community = InMemoryDocumentStore::with_documents("community", ["Python ZeroDivisionError fix: check the divisor first"]);
        let enricher = SuggestionEnricher::new(Some(Arc::new(SlowStore)), Some(Arc::new(community))).with_timeout(Duration::from_millis(50));

        let enriched = enricher.enrich(finding(ErrorKind::ZeroDivision, "Possible division by zero")).await;
        assert_eq!(
            enriched.prevention.as_deref(),
            Some("Based on Stack Overflow: Python ZeroDivisionError fix: check the divisor first...")
        );
    }

    #[tokio::test]
    async fn test_failures_isolated_per_finding() {
        let mut store = MockDocumentStore::new();
        store.expect_name().return_const("flaky".to_string());
        store.expect_query().returning(|text, _| {
            if text.starts_with("NameError") {
                Err(StoreError::QueryFailed { message: "bad shard".to_string() })
            } else {
                Ok(vec!["Prevention: guard the divisor".to_string()])
            }
        });

        let enricher = SuggestionEnricher::new(Some(Arc::new(store)), None);
        let enriched = enricher
            .enrich_all(vec![finding(ErrorKind::Name, "'x' is not defined"), finding(ErrorKind::ZeroDivision, "Possible division by zero")])
            .await;

        assert_eq!(enriched[0].prevention, Some(fallback_prevention(ErrorKind::Name)));
        assert_eq!(enriched[1].prevention.as_deref(), Some("guard the divisor"));
    }

    /// Records how many queries overlap
    #[derive(Default)]
    struct CountingStore {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        fn name(&self) -> String {
            "counting".to_string()
        }

        async fn query(&self, text: &str, _top_k: usize) -> Result<Vec<String>, StoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![format!("Prevention: {}", text)])
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_enrich_all_bounds_in_flight_queries() {
        let store = Arc::new(CountingStore::default());
        let enricher = SuggestionEnricher::new(Some(store.clone()), None).with_concurrency(3);

        let findings: Vec<Finding> = (0..20).map(|n| finding(ErrorKind::Name, &format!("'v{}' is not defined", n))).collect();
        let enriched = enricher.enrich_all(findings).await;

        assert_eq!(enriched.len(), 20);
        assert!(store.peak.load(Ordering::SeqCst) <= 3);
        assert!(store.peak.load(Ordering::SeqCst) > 1);
        for (n, finding) in enriched.iter().enumerate() {
            assert_eq!(finding.prevention.as_deref(), Some(format!("NameError 'v{}' is not defined", n).as_str()));
        }
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        assert_eq!(SuggestionEnricher::new(None, None).with_concurrency(0).concurrency(), 1);
        assert_eq!(SuggestionEnricher::new(None, None).concurrency(), DEFAULT_ENRICH_CONCURRENCY);
    }
}
