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

//! HTTP router and CORS policy

use crate::analyzer::Analyzer;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{analyze, health};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, ORIGIN};
use hyper::{Method, Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Which origins may call the API from a browser
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(origins: Vec<String>) -> Self {
        Self { origins }
    }

    /// `Access-Control-Allow-Origin` value for a request origin, if permitted
    pub fn allow_origin(&self, request_origin: Option<&str>) -> Option<String> {
        if self.origins.iter().any(|origin| origin == "*") {
            return Some("*".to_string());
        }

        request_origin.filter(|origin| self.origins.iter().any(|allowed| allowed == origin)).map(str::to_string)
    }

    /// Add CORS headers to an outgoing response
    pub fn apply(&self, request_origin: Option<&str>, response: &mut Response<Full<Bytes>>) {
        let Some(origin) = self.allow_origin(request_origin) else {
            return;
        };

        let headers = response.headers_mut();
        match HeaderValue::from_str(&origin) {
            Ok(value) => {
                headers.insert("access-control-allow-origin", value);
            }
            Err(e) => {
                warn!("Cannot echo origin {}: {}", origin, e);
                return;
            }
        }
        headers.insert("access-control-allow-methods", HeaderValue::from_static(ALLOW_METHODS));
        headers.insert("access-control-allow-headers", HeaderValue::from_static(ALLOW_HEADERS));
        if origin != "*" {
            headers.insert("vary", HeaderValue::from_static("Origin"));
        }
    }
}

/// HTTP router for the analysis API
pub struct Router {
    analyzer: Arc<Analyzer>,
    cors: CorsPolicy,
    max_body_size: usize,
}

impl Router {
    /// Create a new router
    pub fn new(analyzer: Arc<Analyzer>, config: &Config) -> Self {
        Self {
            analyzer,
            cors: CorsPolicy::new(config.cors_origins.clone()),
            max_body_size: config.max_body_size,
        }
    }

    /// Route a request and render any error, always with CORS headers
    pub async fn handle<B>(&self, req: Request<B>, remote_addr: Option<SocketAddr>) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let origin = req.headers().get(ORIGIN).and_then(|value| value.to_str().ok()).map(str::to_string);

        let mut response = match self.route(req, remote_addr).await {
            Ok(response) => response,
            Err(e) => {
                info!("Request failed: {}", e);
                Response::from(e)
            }
        };

        self.cors.apply(origin.as_deref(), &mut response);
        response
    }

    /// Route a request to the appropriate handler
    pub async fn route<B>(&self, req: Request<B>, remote_addr: Option<SocketAddr>) -> ApiResult<Response<Full<Bytes>>>
    where
        B: Body + Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        info!("{} {}", method, path);

        match (&method, path.as_str()) {
            (&Method::GET, "/") => health::service_info(self.analyzer.enricher()).await,
            (&Method::POST, "/v1/analyze") => analyze::analyze(req, self.analyzer.clone(), remote_addr, self.max_body_size).await,
            (&Method::OPTIONS, "/" | "/v1/analyze") => analyze::preflight(),
            (_, "/" | "/v1/analyze") => Err(ApiError::MethodNotAllowed {
                message: format!("{} is not supported on {}", method, path),
            }),
            _ => Err(ApiError::NotFound {
                message: format!("No route for {}", path),
            }),
        }
    }
}
