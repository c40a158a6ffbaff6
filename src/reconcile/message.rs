//! Release notes cleanup and minimum engine version badges.
//!
//! Asset authors advertise the oldest engine release they support with a
//! shields-style badge such as
//! `![](https://img.shields.io/badge/Defold-1.4.0-blue)`. The badge line is
//! dropped from the stored message and its version kept separately.

use regex::Regex;
use std::sync::LazyLock;

static BADGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s)]*?Defold-([^/\s]*)").expect("Invalid version badge regex")
});

/// Release body split into display text and badge version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReleaseNotes {
    pub message: String,
    pub min_defold_version: Option<String>,
}

impl ReleaseNotes {
    pub fn parse(body: &str) -> Self {
        let normalized = normalize(body);
        let mut min_defold_version = None;
        let mut kept = Vec::new();

        for line in normalized.split('\n') {
            let Some(caps) = BADGE_RE.captures(line) else {
                kept.push(line);
                continue;
            };
            if min_defold_version.is_none() {
                let token = caps.get(1).map_or("", |m| m.as_str());
                let version = token.split('-').next().unwrap_or_default();
                if !version.is_empty() {
                    min_defold_version = Some(version.to_string());
                }
            }
        }

        Self {
            message: kept.join("\n"),
            min_defold_version,
        }
    }
}

/// Unify line endings and drop control characters other than tab and newline.
pub fn normalize(body: &str) -> String {
    body.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .collect()
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_normalize_strips_control_characters() {
        assert_eq!(normalize("a\u{0}b\u{8}c\td\u{b}e\u{c}f\u{1b}g\u{1f}"), "abc\tdefg");
    }

    #[test]
    fn test_badge_extracted_and_line_removed() {
        let body = "Fixes\n![](https://img.shields.io/badge/Defold-1.4.0-blue)\nMore";
        let notes = ReleaseNotes::parse(body);
        assert_eq!(notes.min_defold_version.as_deref(), Some("1.4.0"));
        assert_eq!(notes.message, "Fixes\nMore");
    }

    #[test]
    fn test_no_badge() {
        let notes = ReleaseNotes::parse("Just notes\r\nand more");
        assert_eq!(notes.min_defold_version, None);
        assert_eq!(notes.message, "Just notes\nand more");
    }

    #[test]
    fn test_first_badge_wins_all_stripped() {
        let body = "[![Defold](https://img.shields.io/badge/Defold-1.2.190-green.svg)](https://defold.com)\n\
                    text\n\
                    ![](https://img.shields.io/badge/Defold-1.9.0-blue)";
        let notes = ReleaseNotes::parse(body);
        assert_eq!(notes.min_defold_version.as_deref(), Some("1.2.190"));
        assert_eq!(notes.message, "text");
    }

    #[test]
    fn test_badge_token_stops_at_slash_and_whitespace() {
        let notes = ReleaseNotes::parse("see https://example.com/badge/Defold-1.6.4/extra");
        assert_eq!(notes.min_defold_version.as_deref(), Some("1.6.4"));
        assert_eq!(notes.message, "");

        let notes = ReleaseNotes::parse("https://example.com/badge/Defold-1.6.5 trailing");
        assert_eq!(notes.min_defold_version.as_deref(), Some("1.6.5"));
    }

    #[test]
    fn test_empty_badge_token_not_captured() {
        let body = "https://img.shields.io/badge/Defold--blue\n\
                    https://img.shields.io/badge/Defold-1.3.0-blue";
        let notes = ReleaseNotes::parse(body);
        assert_eq!(notes.min_defold_version.as_deref(), Some("1.3.0"));
        assert_eq!(notes.message, "");
    }

    #[test]
    fn test_plain_word_is_not_a_badge() {
        let notes = ReleaseNotes::parse("Requires Defold-1.4.0 or newer");
        assert_eq!(notes.min_defold_version, None);
        assert_eq!(notes.message, "Requires Defold-1.4.0 or newer");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(ReleaseNotes::parse(""), ReleaseNotes::default());
    }
}
