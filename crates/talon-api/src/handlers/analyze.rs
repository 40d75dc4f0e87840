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

//! Analysis handlers

use super::json_response;
use crate::analyzer::Analyzer;
use crate::error::{ApiError, ApiResult};
use crate::models::AnalysisRequest;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::AUTHORIZATION;
use hyper::{Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

/// Analyze Python source
/// POST /v1/analyze
pub async fn analyze<B>(req: Request<B>, analyzer: Arc<Analyzer>, remote_addr: Option<SocketAddr>, max_body_size: usize) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body + Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    info!("Processing analyze request");

    let auth_header = req.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(str::to_string);

    let body = Limited::new(req.into_body(), max_body_size).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge {
                message: format!("Request body exceeds {} bytes", max_body_size),
            }
        } else {
            ApiError::BadRequest {
                message: format!("Failed to read request body: {}", e),
            }
        }
    })?;
    let body = body.to_bytes();

    let request: AnalysisRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AnalysisRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest {
            message: "Invalid JSON body".to_string(),
        })?
    };

    // A panic inside the analysis surfaces as a JoinError instead of dropping the connection
    let response = tokio::spawn(async move { analyzer.analyze(request, auth_header.as_deref(), remote_addr.map(|addr| addr.ip())).await })
        .await
        .map_err(|e| {
            error!("Analysis task failed: {}", e);
            ApiError::internal("Analysis failed", e)
        })??;

    json_response(StatusCode::OK, &response)
}

/// CORS preflight
/// OPTIONS /v1/analyze
pub fn preflight() -> ApiResult<Response<Full<Bytes>>> {
    Ok(Response::builder().status(StatusCode::NO_CONTENT).body(Full::new(Bytes::new()))?)
}
