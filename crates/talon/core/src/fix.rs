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

//! Targeted per-line fix synthesis
//!
//! At most one patch is applied per source line (the first finding on a line
//! wins). Patches are applied from the bottom of the file upward so line
//! indices of pending patches stay valid.

use crate::finding::{ErrorKind, Finding};
use std::collections::BTreeMap;
use tracing::debug;

const INDENT: &str = "    ";

/// Corrected source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub fixed_code: String,
    pub fixes_applied: usize,
}

/// Apply one targeted patch per affected line
pub fn synthesize_fixes(code: &str, findings: &[Finding]) -> FixOutcome {
    let mut lines: Vec<String> = code.split('\n').map(str::to_string).collect();

    let mut first_per_line: BTreeMap<usize, &Finding> = BTreeMap::new();
    for finding in findings {
        first_per_line.entry(finding.line).or_insert(finding);
    }

    let mut fixes_applied = 0;
    let mut needs_os_import = false;

    for (&line_num, finding) in first_per_line.iter().rev() {
        let Some(line) = lines.get(line_num) else {
            continue;
        };
        // Patch the text before any CRLF remnant, then restore it on every emitted line
        let (original, line_end) = match line.strip_suffix('\r') {
            Some(body) => (body.to_string(), "\r"),
            None => (line.clone(), ""),
        };

        let patch = match finding.kind {
            ErrorKind::ModuleNotFound => finding.subject.as_deref().map(|module| vec![format!("{}  # Run: pip install {}", original, module)]),
            ErrorKind::Name => finding.subject.as_deref().map(|name| fix_name(&original, finding.column, name)),
            ErrorKind::FileNotFound => match finding.subject.as_deref() {
                Some(file) if !opens_block(&original) => {
                    needs_os_import = true;
                    Some(guard_file(&original, file))
                }
                _ => None,
            },
            ErrorKind::ZeroDivision | ErrorKind::Attribute | ErrorKind::Type => {
                if opens_block(&original) {
                    None
                } else {
                    Some(wrap_try(&original, finding.kind.python_name()))
                }
            }
        };

        match patch {
            Some(replacement) => {
                lines.splice(line_num..=line_num, replacement.into_iter().map(|patched| format!("{}{}", patched, line_end)));
                fixes_applied += 1;
            }
            None => debug!("No fix applied for {} at line {}", finding.kind, line_num),
        }
    }

    if needs_os_import && !imports_os(code) {
        lines.insert(0, "import os".to_string());
    }

    FixOutcome {
        fixed_code: lines.join("\n"),
        fixes_applied,
    }
}

/// Python spelling of a known mistyped literal or builtin
fn literal_replacement(name: &str) -> Option<&'static str> {
    match name {
        "true" | "Ture" => Some("True"),
        "false" | "Flase" => Some("False"),
        "null" | "none" => Some("None"),
        "pritn" => Some("print"),
        "lenght" => Some("len"),
        _ => None,
    }
}

fn fix_name(line: &str, column: usize, name: &str) -> Vec<String> {
    if let Some(replacement) = literal_replacement(name) {
        let start = line.char_indices().nth(column).map(|(byte, _)| byte).unwrap_or(line.len());
        if let Some(offset) = line[start..].find(name) {
            let at = start + offset;
            return vec![format!("{}{}{}", &line[..at], replacement, &line[at + name.len()..])];
        }
    }

    let indent = indentation(line);
    vec![format!("{}{} = 0  # initialize before use", indent, name), line.to_string()]
}

fn guard_file(line: &str, file: &str) -> Vec<String> {
    let indent = indentation(line);
    vec![
        format!("{}if os.path.exists('{}'):", indent, file),
        format!("{}{}{}", indent, INDENT, line.trim()),
        format!("{}else:", indent),
        format!("{}{}print('File not found: {}')", indent, INDENT, file),
    ]
}

fn wrap_try(line: &str, exception: &str) -> Vec<String> {
    let indent = indentation(line);
    vec![
        format!("{}try:", indent),
        format!("{}{}{}", indent, INDENT, line.trim()),
        format!("{}except {}:", indent, exception),
        format!("{}{}pass  # talon: handle {}", indent, INDENT, exception),
    ]
}

fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start();
    &line[..line.len() - trimmed.len()]
}

fn opens_block(line: &str) -> bool {
    line.trim_end().ends_with(':')
}

fn imports_os(code: &str) -> bool {
    code.split('\n').map(str::trim).any(|line| line == "import os" || line.starts_with("import os ") || line.starts_with("import os,"))
}
