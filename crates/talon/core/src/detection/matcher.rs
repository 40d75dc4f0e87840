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

//! Line-level pattern matching

use super::context::{AssignmentContext, strip_comment};
use super::rules::RuleSet;
use crate::finding::Finding;
use tracing::debug;

/// Scans source text against an ordered rule table
#[derive(Debug, Clone, Copy)]
pub struct PatternMatcher<'a> {
    rules: &'a RuleSet,
}

impl Default for PatternMatcher<'static> {
    fn default() -> Self {
        Self::new(RuleSet::builtin())
    }
}

impl<'a> PatternMatcher<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    /// Detect candidate findings.
    ///
    /// Blank lines, comment lines and trailing comments are ignored. Output is
    /// ordered by line, then kind declaration order, then pattern declaration
    /// order, with assignment-tracking findings after the table patterns of
    /// their kind. Every matching pattern contributes one finding.
    pub fn detect(&self, code: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        let mut context = AssignmentContext::new();

        for (line_num, line) in code.split('\n').enumerate() {
            let source = strip_comment(line);
            if source.trim().is_empty() {
                continue;
            }

            let snippet = line.trim();
            let line_start = findings.len();

            for rule in self.rules.rules() {
                let Some(captures) = rule.regex.captures(source) else {
                    continue;
                };
                let Some(matched) = captures.get(0) else {
                    continue;
                };

                findings.push(Finding {
                    kind: rule.kind,
                    message: rule.render(&captures),
                    line: line_num,
                    column: source[..matched.start()].chars().count(),
                    snippet: snippet.to_string(),
                    prevention: None,
                    subject: captures.get(1).map(|m| m.as_str().to_string()),
                });
            }

            findings.extend(context.findings(line_num, source, snippet));
            findings[line_start..].sort_by_key(|finding| finding.kind);

            context.observe(source);
        }

        debug!("Pattern matcher produced {} findings", findings.len());
        findings
    }
}

/// Detect findings with the built-in rule table
pub fn detect(code: &str) -> Vec<Finding> {
    PatternMatcher::default().detect(code)
}
