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

//! Assignment tracking across lines
//!
//! Names whose latest assignment is `None` or a literal zero are remembered
//! while scanning, so a later `name.attr` or `x / name` is reported even though
//! that line alone looks harmless. Any other assignment forgets the name.

use crate::finding::{ErrorKind, Finding};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static ASSIGNMENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_]\w*)\s*([-+*/%]?)=([^=].*)?$").ok());
static ZERO_LITERAL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^0+(?:\.0+)?$").ok());
static ATTRIBUTE_ACCESS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\.([A-Za-z_]\w*)").ok());
static DIVISOR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?:/{1,2}|%)\s*([A-Za-z_]\w*)\b").ok());

/// Names known to hold `None` or zero at the current line
#[derive(Debug, Default)]
pub struct AssignmentContext {
    none: HashSet<String>,
    zero: HashSet<String>,
}

impl AssignmentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Findings on `source` caused by earlier assignments, at most one per kind.
    ///
    /// `source` is the line with any trailing comment removed; `snippet` is
    /// what the finding reports.
    pub fn findings(&self, line_num: usize, source: &str, snippet: &str) -> Vec<Finding> {
        let mut findings = Vec::new();

        if let Some(access) = ATTRIBUTE_ACCESS.as_ref() {
            let hit = access.captures_iter(source).find(|captures| self.none.contains(&captures[1]));
            if let Some(captures) = hit {
                findings.push(Finding {
                    kind: ErrorKind::Attribute,
                    message: format!("'{}' might be None when accessing '{}'", &captures[1], &captures[2]),
                    line: line_num,
                    column: column_of(source, &captures),
                    snippet: snippet.to_string(),
                    prevention: None,
                    subject: Some(captures[1].to_string()),
                });
            }
        }

        if let Some(divisor) = DIVISOR.as_ref() {
            let hit = divisor.captures_iter(source).find(|captures| self.zero.contains(&captures[1]));
            if let Some(captures) = hit {
                findings.push(Finding {
                    kind: ErrorKind::ZeroDivision,
                    message: format!("Possible division by zero: '{}' was assigned 0", &captures[1]),
                    line: line_num,
                    column: column_of(source, &captures),
                    snippet: snippet.to_string(),
                    prevention: None,
                    subject: Some(captures[1].to_string()),
                });
            }
        }

        findings
    }

    /// Record the assignment made by `source`, if any
    pub fn observe(&mut self, source: &str) {
        let Some(captures) = ASSIGNMENT.as_ref().and_then(|assignment| assignment.captures(source)) else {
            return;
        };

        let name = &captures[1];
        let augmented = !captures[2].is_empty();
        let value = captures.get(3).map(|m| m.as_str().trim()).unwrap_or("");

        self.none.remove(name);
        self.zero.remove(name);

        if augmented {
            return;
        }
        if value == "None" {
            self.none.insert(name.to_string());
        } else if ZERO_LITERAL.as_ref().is_some_and(|zero| zero.is_match(value)) {
            self.zero.insert(name.to_string());
        }
    }
}

fn column_of(source: &str, captures: &regex::Captures<'_>) -> usize {
    captures.get(0).map(|m| source[..m.start()].chars().count()).unwrap_or(0)
}

/// The line up to its first `#` outside a string literal
pub fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (index, ch) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if ch == '\\' => escaped = true,
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == '#' => return &line[..index],
            None => {}
        }
    }

    line
}
