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

//! Error handling for the analysis API

use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use serde::{Deserialize, Serialize};
use talon_core::{StoreError, UsageError};
use thiserror::Error;
use tracing::error;

/// API error types, the only errors that reach HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Method not allowed: {message}")]
    MethodNotAllowed { message: String },

    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("Too many requests: {message}")]
    TooManyRequests { message: String, upgrade_url: String },

    #[error("Internal server error: {message} ({details})")]
    InternalServerError { message: String, details: String },

    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Hyper error: {0}")]
    HyperError(#[from] hyper::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wrap an unexpected failure with a diagnostic string
    pub fn internal(message: impl Into<String>, details: impl ToString) -> Self {
        ApiError::InternalServerError {
            message: message.into(),
            details: details.to_string(),
        }
    }
}

/// JSON error body: `{error}`, plus `upgrade_url` on 429 and `details` on 500
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&ApiError> for ErrorBody {
    fn from(error: &ApiError) -> Self {
        let (message, upgrade_url, details) = match error {
            ApiError::BadRequest { message }
            | ApiError::NotFound { message }
            | ApiError::MethodNotAllowed { message }
            | ApiError::PayloadTooLarge { message } => (message.clone(), None, None),
            ApiError::TooManyRequests { message, upgrade_url } => (message.clone(), Some(upgrade_url.clone()), None),
            ApiError::InternalServerError { message, details } => (message.clone(), None, Some(details.clone())),
            other => ("Internal server error".to_string(), None, Some(other.to_string())),
        };

        Self {
            error: message,
            upgrade_url,
            details,
        }
    }
}

/// Convert ApiError to HTTP response
impl From<ApiError> for Response<Full<Bytes>> {
    fn from(error: ApiError) -> Self {
        let status_code = error.status_code();
        if status_code.is_server_error() {
            error!("API Error: {} - {}", status_code, error);
        }

        let json = match serde_json::to_string(&ErrorBody::from(&error)) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize error response: {}", e);
                r#"{"error":"Internal server error"}"#.to_string()
            }
        };

        let mut response = Response::new(Full::new(Bytes::from(json)));
        *response.status_mut() = status_code;
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/json"));
        response
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl From<hyper::http::Error> for ApiError {
    fn from(err: hyper::http::Error) -> Self {
        ApiError::HttpError(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal("Document store setup failed", err)
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        ApiError::internal("Analysis failed", err)
    }
}
