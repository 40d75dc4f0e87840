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

//! Request and response bodies

use serde::{Deserialize, Serialize};
use talon_core::{Finding, Tier, Usage};

/// Body of `POST /v1/analyze`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisRequest {
    /// Python source text
    #[serde(default)]
    pub code: Option<String>,

    /// Also return a corrected copy of the source
    #[serde(default)]
    pub fix_errors: bool,
}

impl AnalysisRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            fix_errors: false,
        }
    }

    pub fn with_fixes(mut self) -> Self {
        self.fix_errors = true;
        self
    }
}

/// Successful analysis result
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub errors: Vec<Finding>,
    pub analyzed_lines: usize,
    pub tier: Tier,
    pub usage: Usage,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixes_applied: Option<usize>,
}

/// Document counts per retrieval store, `None` when the store is absent or unreachable
#[derive(Debug, Clone, Serialize)]
pub struct DocumentCounts {
    pub prevention_rules: Option<usize>,
    pub community_solutions: Option<usize>,
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub service: String,
    pub version: String,
    pub features: Vec<String>,
    pub status: String,
    pub documents: DocumentCounts,
}
