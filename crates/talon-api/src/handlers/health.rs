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

//! Service information handler

use super::json_response;
use crate::error::ApiResult;
use crate::models::{DocumentCounts, HealthResponse};
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use std::sync::Arc;
use talon_core::store::{COUNT_TIMEOUT, count_within};
use talon_core::{DocumentStore, SuggestionEnricher};
use tracing::{info, warn};

const FEATURES: &[&str] = &["error_detection", "prevention_suggestions", "fix_synthesis", "usage_tiers"];

/// Service identity and store sizes
/// GET /
pub async fn service_info(enricher: &SuggestionEnricher) -> ApiResult<Response<Full<Bytes>>> {
    info!("Processing service info request");

    let (prevention_rules, community_solutions) = tokio::join!(document_count(enricher.primary()), document_count(enricher.secondary()));

    let response = HealthResponse {
        service: "Talon Error Prevention API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: FEATURES.iter().map(|feature| feature.to_string()).collect(),
        status: "running".to_string(),
        documents: DocumentCounts {
            prevention_rules,
            community_solutions,
        },
    };

    json_response(StatusCode::OK, &response)
}

/// Size of a store, `None` when absent, failing or slow
async fn document_count(store: Option<&Arc<dyn DocumentStore>>) -> Option<usize> {
    let store = store?;
    count_within(store.as_ref(), COUNT_TIMEOUT)
        .await
        .inspect_err(|e| warn!("Failed to count documents in '{}': {}", store.name(), e))
        .ok()
}
