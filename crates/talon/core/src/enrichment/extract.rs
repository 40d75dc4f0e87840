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

//! Prevention text extraction from retrieved documents

use crate::finding::ErrorKind;

/// Maximum length, in characters, of an extracted passage
pub const MAX_PREVENTION_CHARS: usize = 200;

const PREVENTION_MARKER: &str = "Prevention:";
const TALON_SYNTAX_MARKER: &str = "Talon Syntax:";

/// Extract a prevention tip from a curated rule document.
///
/// A `Prevention:` marker wins over a `Talon Syntax:` marker. Returns `None`
/// when neither marker yields any text.
pub fn extract_prevention(document: &str) -> Option<String> {
    let lines: Vec<&str> = document.lines().collect();

    if let Some(index) = lines.iter().position(|line| line.contains(PREVENTION_MARKER)) {
        let head = lines[index].split_once(':').map(|(_, rest)| rest.trim()).unwrap_or("");
        let text = match lines.get(index + 1) {
            Some(next) => format!("{} {}", head, next.trim()),
            None => head.to_string(),
        };
        return non_empty(truncate_chars(text.trim(), MAX_PREVENTION_CHARS));
    }

    if let Some(index) = lines.iter().position(|line| line.contains(TALON_SYNTAX_MARKER)) {
        let syntax = lines.get(index + 1).map(|next| next.trim()).unwrap_or("");
        return non_empty(truncate_chars(syntax, MAX_PREVENTION_CHARS)).map(|syntax| format!("Use Talon: {}", syntax));
    }

    None
}

/// Format a community answer as a prevention tip
pub fn community_prevention(document: &str) -> Option<String> {
    non_empty(truncate_chars(document.trim(), MAX_PREVENTION_CHARS)).map(|excerpt| format!("Based on Stack Overflow: {}...", excerpt))
}

/// Generic tip used when no store produced anything
pub fn fallback_prevention(kind: ErrorKind) -> String {
    format!("Review the code for potential {} issues and add appropriate error handling.", kind)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prevention_marker() {
        let document = "AttributeError on None\nPrevention: avoid None access";
        assert_eq!(extract_prevention(document).unwrap(), "avoid None access");
    }

    #[test]
    fn test_prevention_includes_following_line() {
        let document = "Rule 12\nPrevention: check the divisor\n  before dividing.\nIgnored line";
        assert_eq!(extract_prevention(document).unwrap(), "check the divisor before dividing.");
    }

    #[test]
    fn test_prevention_splits_on_first_colon() {
        let document = "Rule: Prevention: keep going";
        assert_eq!(extract_prevention(document).unwrap(), "Prevention: keep going");
    }

    #[test]
    fn test_prevention_truncated_to_limit() {
        let document = format!("Prevention: {}", "é".repeat(300));
        let text = extract_prevention(&document).unwrap();
        assert_eq!(text.chars().count(), MAX_PREVENTION_CHARS);
    }

    #[test]
    fn test_talon_syntax_marker() {
        let document = "Talon Syntax:\n  safe_div(a, b)\n";
        assert_eq!(extract_prevention(document).unwrap(), "Use Talon: safe_div(a, b)");
    }

    #[test]
    fn test_prevention_marker_wins_over_talon_syntax() {
        let document = "Talon Syntax:\nsafe_open(path)\nPrevention: check the path";
        assert_eq!(extract_prevention(document).unwrap(), "check the path");
    }

    #[test]
    fn test_no_marker_is_miss() {
        assert!(extract_prevention("Just some text about errors").is_none());
        assert!(extract_prevention("Talon Syntax:").is_none());
        assert!(extract_prevention("Prevention:").is_none());
        assert!(extract_prevention("").is_none());
    }

    #[test]
    fn test_community_prevention() {
        let text = community_prevention("  Wrap the call in try/except  ").unwrap();
        assert_eq!(text, "Based on Stack Overflow: Wrap the call in try/except...");

        let long = community_prevention(&"a".repeat(500)).unwrap();
        assert_eq!(long.len(), "Based on Stack Overflow: ".len() + MAX_PREVENTION_CHARS + 3);

        assert!(community_prevention("   ").is_none());
    }

    #[test]
    fn test_fallback_names_kind() {
        assert_eq!(
            fallback_prevention(ErrorKind::FileNotFound),
            "Review the code for potential FileNotFoundError issues and add appropriate error handling."
        );
    }
}
