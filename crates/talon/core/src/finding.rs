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

//! Findings produced by the pattern matcher

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a potential runtime error.
///
/// Variants are declared in matching order: findings on one line are emitted
/// kind by kind in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "ModuleNotFoundError")]
    ModuleNotFound,

    #[serde(rename = "AttributeError")]
    Attribute,

    #[serde(rename = "TypeError")]
    Type,

    #[serde(rename = "NameError")]
    Name,

    #[serde(rename = "FileNotFoundError")]
    FileNotFound,

    #[serde(rename = "ZeroDivisionError")]
    ZeroDivision,
}

impl ErrorKind {
    /// All kinds in declaration order
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::ModuleNotFound,
        ErrorKind::Attribute,
        ErrorKind::Type,
        ErrorKind::Name,
        ErrorKind::FileNotFound,
        ErrorKind::ZeroDivision,
    ];

    /// Python exception name for this kind
    pub fn python_name(&self) -> &'static str {
        match self {
            ErrorKind::ModuleNotFound => "ModuleNotFoundError",
            ErrorKind::Attribute => "AttributeError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Name => "NameError",
            ErrorKind::FileNotFound => "FileNotFoundError",
            ErrorKind::ZeroDivision => "ZeroDivisionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.python_name())
    }
}

/// One heuristically detected potential runtime error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Error category
    #[serde(rename = "type")]
    pub kind: ErrorKind,

    /// Rendered message template
    pub message: String,

    /// Zero-based line index
    pub line: usize,

    /// Zero-based character offset of the match start within the line
    pub column: usize,

    /// Source line with surrounding whitespace stripped
    #[serde(rename = "code_snippet")]
    pub snippet: String,

    /// Advisory text, set by the enricher
    pub prevention: Option<String>,

    /// First capture of the matching pattern (module, object, variable or file name)
    #[serde(skip)]
    pub subject: Option<String>,
}

impl Finding {
    /// Return this finding with its prevention text set
    pub fn with_prevention(mut self, prevention: String) -> Self {
        self.prevention = Some(prevention);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&ErrorKind::ZeroDivision).unwrap();
        assert_eq!(json, "\"ZeroDivisionError\"");

        let kind: ErrorKind = serde_json::from_str("\"ModuleNotFoundError\"").unwrap();
        assert_eq!(kind, ErrorKind::ModuleNotFound);
    }

    #[test]
    fn test_declaration_order() {
        let mut sorted = ErrorKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ErrorKind::ALL);
    }

    #[test]
    fn test_finding_serializes_wire_fields() {
        let finding = Finding {
            kind: ErrorKind::Name,
            message: "'null' is not defined".to_string(),
            line: 3,
            column: 4,
            snippet: "x = null".to_string(),
            prevention: None,
            subject: Some("null".to_string()),
        }
        .with_prevention("Use None".to_string());

        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["type"], "NameError");
        assert_eq!(value["code_snippet"], "x = null");
        assert_eq!(value["prevention"], "Use None");
        assert!(value.get("subject").is_none());
    }
}
