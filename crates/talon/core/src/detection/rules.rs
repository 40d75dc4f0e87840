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

//! Declarative pattern table
//!
//! Each error kind owns an ordered list of `(pattern, template)` pairs. Templates
//! reference named placeholders: `{module}`, `{obj}`, `{var}` and `{file}` take
//! capture group 1, `{attr}` takes capture group 2.

use crate::finding::ErrorKind;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::warn;

/// Uncompiled rule declaration
pub type RuleSpec = (ErrorKind, &'static [(&'static str, &'static str)]);

/// Built-in rules, in matching order
pub const BUILTIN_RULES: &[RuleSpec] = &[
    (
        ErrorKind::ModuleNotFound,
        &[
            (r"^\s*import\s+([A-Za-z_][\w.]*)", "Module '{module}' might not be installed"),
            (r"^\s*from\s+([A-Za-z_][\w.]*)\s+import\b", "Module '{module}' might not be installed"),
        ],
    ),
    (
        ErrorKind::Attribute,
        &[
            (r"\b(None)\.(\w+)", "'{obj}' has no attribute '{attr}'"),
            (r"\b(\w+)\.get\([^)]*\)\.(\w+)", "'{obj}.get()' may return None before accessing '{attr}'"),
            (r"\bre\.(match|search|fullmatch)\([^)]*\)\.(\w+)", "re.{obj}() may return None before accessing '{attr}'"),
        ],
    ),
    (
        ErrorKind::Type,
        &[
            (r#"("[^"]*"|'[^']*')\s*\+\s*(\d+(?:\.\d+)?)\b"#, "Cannot concatenate string {obj} with number {attr}"),
            (r#"\b(\d+(?:\.\d+)?)\s*\+\s*("[^"]*"|'[^']*')"#, "Cannot add number {obj} to string {attr}"),
            (r"\blen\(\s*(\d+)\s*\)", "Object of type int ({obj}) has no len()"),
        ],
    ),
    (
        ErrorKind::Name,
        &[
            (r"\b(true|false|null|none|Ture|Flase|pritn|lenght)\b", "'{var}' is not defined"),
            (r"^\s*([A-Za-z_]\w*)\s*[-+*/]=", "'{var}' might be referenced before assignment"),
        ],
    ),
    (
        ErrorKind::FileNotFound,
        &[
            (r#"\bopen\(\s*['"]([^'"]+)['"]"#, "File '{file}' might not exist"),
            (r#"\bread_(?:csv|excel|json|parquet)\(\s*['"]([^'"]+)['"]"#, "Data file '{file}' might not exist"),
        ],
    ),
    (
        ErrorKind::ZeroDivision,
        &[
            (r"(?:/{1,2}|%)\s*0+(?:\.0+)?(?:[^\w.]|$)", "Possible division by zero"),
            (r"(?:/{1,2}|%)\s*(len\([^)]*\))", "Possible division by zero if {var} is 0"),
        ],
    ),
];

static BUILTIN: LazyLock<RuleSet> = LazyLock::new(|| RuleSet::compile(BUILTIN_RULES));

static PLACEHOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{(module|obj|var|file|attr)\}").ok());

/// A compiled detection rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: ErrorKind,
    pub regex: Regex,
    pub template: &'static str,
}

impl Rule {
    /// Render the message template against a match
    pub fn render(&self, captures: &Captures<'_>) -> String {
        let first = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        let second = captures.get(2).map(|m| m.as_str()).unwrap_or("");

        let Some(placeholder) = PLACEHOLDER.as_ref() else {
            return self.template.to_string();
        };

        // Single pass, so captured text is never re-expanded
        placeholder
            .replace_all(self.template, |slot: &Captures<'_>| if &slot[1] == "attr" { second } else { first })
            .into_owned()
    }
}

/// Ordered, compiled rule table
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile a rule table, dropping patterns that fail to compile
    pub fn compile(specs: &[RuleSpec]) -> Self {
        let mut rules = Vec::new();

        for (kind, patterns) in specs {
            for &(pattern, template) in patterns.iter() {
                match Regex::new(pattern) {
                    Ok(regex) => rules.push(Rule { kind: *kind, regex, template }),
                    Err(e) => warn!("Dropping {} pattern {:?}: {}", kind, pattern, e),
                }
            }
        }

        // Stable sort keeps declaration order within a kind
        rules.sort_by_key(|rule| rule.kind);

        Self { rules }
    }

    /// The built-in rule table
    pub fn builtin() -> &'static RuleSet {
        &BUILTIN
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
