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

//! Analysis orchestration: credentials, quota, detection, enrichment and fixes

use crate::auth::AuthService;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::AnalysisRequest;
use crate::models::AnalysisResponse;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use talon_core::{
    ChromaDocumentStore, DocumentStore, FileUsageStore, InMemoryDocumentStore, InMemoryUsageStore, PatternMatcher, SuggestionEnricher, UsageDecision, UsageGate, UsageStore, synthesize_fixes,
};
use talon_core::store::{COUNT_TIMEOUT, count_within};
use tracing::{info, warn};

/// Runs one analysis request end to end
pub struct Analyzer {
    auth: AuthService,
    gate: UsageGate,
    enricher: SuggestionEnricher,
}

impl Analyzer {
    pub fn new(auth: AuthService, gate: UsageGate, enricher: SuggestionEnricher) -> Self {
        Self { auth, gate, enricher }
    }

    /// Wire up stores and the usage gate from configuration
    pub fn from_config(config: &Config) -> ApiResult<Self> {
        let auth = AuthService::new(&config.jwt_secret, config.anonymous_per_ip);

        let usage_store: Arc<dyn UsageStore> = match &config.usage_store_path {
            Some(path) => {
                info!("Persisting usage counters to {}", path.display());
                Arc::new(FileUsageStore::open(path)?)
            }
            None => Arc::new(InMemoryUsageStore::new()),
        };
        let gate = UsageGate::new(usage_store, config.free_tier_limit, config.upgrade_url.clone());

        let primary = build_document_store(config, &config.rules_collection, config.rules_file.as_deref())?;
        let secondary = build_document_store(config, &config.community_collection, config.community_file.as_deref())?;
        let enricher = SuggestionEnricher::new(primary, secondary)
            .with_timeout(Duration::from_millis(config.store_timeout_ms))
            .with_concurrency(config.enrich_concurrency);

        Ok(Self::new(auth, gate, enricher))
    }

    pub fn enricher(&self) -> &SuggestionEnricher {
        &self.enricher
    }

    /// Log how many documents each configured store holds
    pub async fn log_document_counts(&self) {
        for store in [self.enricher.primary(), self.enricher.secondary()].into_iter().flatten() {
            match count_within(store.as_ref(), COUNT_TIMEOUT).await {
                Ok(count) => info!("Collection '{}' holds {} documents", store.name(), count),
                Err(e) => warn!("Collection '{}' is unavailable, its suggestions will be skipped: {}", store.name(), e),
            }
        }
    }

    /// Analyze a request on behalf of the caller named by `auth_header`
    pub async fn analyze(&self, request: AnalysisRequest, auth_header: Option<&str>, remote_ip: Option<IpAddr>) -> ApiResult<AnalysisResponse> {
        self.analyze_at(request, auth_header, remote_ip, Utc::now()).await
    }

    /// Same as [`Analyzer::analyze`] with an explicit clock for the billing period
    pub async fn analyze_at(&self, request: AnalysisRequest, auth_header: Option<&str>, remote_ip: Option<IpAddr>, now: DateTime<Utc>) -> ApiResult<AnalysisResponse> {
        let code = match request.code {
            Some(code) if !code.is_empty() => code,
            _ => {
                return Err(ApiError::BadRequest {
                    message: "No code provided".to_string(),
                });
            }
        };

        let caller = self.auth.resolve(auth_header, remote_ip);

        let usage = match self.gate.check_and_increment(&caller.user_id, caller.tier, now).await? {
            UsageDecision::Allowed(usage) => usage,
            UsageDecision::Rejected { reason, upgrade_url } => {
                return Err(ApiError::TooManyRequests { message: reason, upgrade_url });
            }
        };

        let findings = PatternMatcher::default().detect(&code);
        let errors = self.enricher.enrich_all(findings).await;

        let (fixed_code, fixes_applied) = if request.fix_errors {
            let outcome = synthesize_fixes(&code, &errors);
            (Some(outcome.fixed_code), Some(outcome.fixes_applied))
        } else {
            (None, None)
        };

        counter!("talon_analyses_total", 1);
        info!("Analyzed {} bytes for {}: {} findings", code.len(), caller.user_id, errors.len());

        Ok(AnalysisResponse {
            analyzed_lines: code.split('\n').count(),
            errors,
            tier: caller.tier,
            usage,
            fixed_code,
            fixes_applied,
        })
    }
}

/// A seed file takes precedence over a remote store; neither means the store is absent
fn build_document_store(config: &Config, collection: &str, seed_file: Option<&Path>) -> ApiResult<Option<Arc<dyn DocumentStore>>> {
    if let Some(path) = seed_file {
        return Ok(Some(Arc::new(InMemoryDocumentStore::from_json_file(collection, path)?)));
    }

    if let Some(url) = &config.chroma_url {
        info!("Using remote collection '{}' at {}", collection, url);
        return Ok(Some(Arc::new(ChromaDocumentStore::new(url, collection)?)));
    }

    warn!("No document store configured for '{}', suggestions will fall back to generic tips", collection);
    Ok(None)
}
