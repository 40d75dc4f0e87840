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

//! Talon analysis core
//!
//! Heuristic detection of common Python runtime errors, retrieval-backed
//! prevention suggestions, free-tier usage accounting and targeted fix
//! synthesis. The HTTP surface lives in `talon-api`.

pub mod detection;
pub mod enrichment;
pub mod finding;
pub mod fix;
pub mod store;
pub mod usage;

pub use detection::{PatternMatcher, RuleSet, detect};
pub use enrichment::SuggestionEnricher;
pub use finding::{ErrorKind, Finding};
pub use fix::{FixOutcome, synthesize_fixes};
pub use store::{ChromaDocumentStore, DocumentStore, InMemoryDocumentStore, StoreError};
pub use usage::{FileUsageStore, InMemoryUsageStore, Tier, Usage, UsageDecision, UsageError, UsageGate, UsageKey, UsageStore};
