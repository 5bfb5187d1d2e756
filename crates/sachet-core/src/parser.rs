//! Parsed file wrapper
//!
//! Bundles a source file with its token stream and the suppression comments
//! harvested from it. Parsing is total: any byte sequence produces a stream,
//! so rules never have to handle a parse failure.

use std::collections::{HashMap, HashSet};

use crate::lexer::tokenize;
use crate::token::{TokenKind, TokenStream};

/// Suppressions recorded for one line. An empty code set is a blanket
/// ignore; otherwise only diagnostics matching one of the codes are
/// suppressed.
#[derive(Debug, Clone, Default)]
struct LineSuppression {
    blanket: bool,
    codes: HashSet<String>,
}

#[derive(Debug)]
pub struct ParsedFile {
    filename: String,
    source: String,
    stream: TokenStream,
    ignored_lines: HashMap<usize, LineSuppression>,
}

impl ParsedFile {
    pub fn from_source(filename: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let stream = tokenize(&source);
        let ignored_lines = collect_suppressions(&stream);
        Self {
            filename: filename.into(),
            source,
            stream,
            ignored_lines,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn stream(&self) -> &TokenStream {
        &self.stream
    }

    /// True when a suppression comment covers `line` for any of the given
    /// aliases. Stored codes match by prefix, the way phpcs rule codes nest.
    pub fn is_suppressed_line(&self, line: usize, aliases: &[&str]) -> bool {
        let Some(suppression) = self.ignored_lines.get(&line) else {
            return false;
        };
        if suppression.blanket {
            return true;
        }
        aliases.iter().any(|alias| {
            let alias = alias.to_ascii_lowercase();
            suppression
                .codes
                .iter()
                .any(|code| alias.starts_with(code.as_str()) || code.starts_with(alias.as_str()))
        })
    }
}

/// A `phpcs:ignore` or `@codingStandardsIgnoreLine` comment suppresses the
/// line it sits on and the line after it, covering both trailing comments
/// and standalone comments above the offending statement.
fn collect_suppressions(stream: &TokenStream) -> HashMap<usize, LineSuppression> {
    let mut out: HashMap<usize, LineSuppression> = HashMap::new();
    for token in stream.tokens() {
        if !matches!(token.kind, TokenKind::Comment | TokenKind::DocComment) {
            continue;
        }
        let lower = token.text.to_ascii_lowercase();
        let suppression = if lower.contains("@codingstandardsignoreline") {
            Some(LineSuppression {
                blanket: true,
                codes: HashSet::new(),
            })
        } else if let Some(idx) = lower.find("phpcs:ignore") {
            let rest = lower[idx + "phpcs:ignore".len()..].trim();
            // Anything after "--" is a human-readable reason.
            let rest = rest.split("--").next().unwrap_or("").trim();
            if rest.is_empty() {
                Some(LineSuppression {
                    blanket: true,
                    codes: HashSet::new(),
                })
            } else {
                let codes = rest
                    .split(',')
                    .map(|code| code.trim().to_string())
                    .filter(|code| !code.is_empty())
                    .collect();
                Some(LineSuppression {
                    blanket: false,
                    codes,
                })
            }
        } else {
            None
        };
        if let Some(suppression) = suppression {
            for line in [token.line, token.line + 1] {
                let entry = out.entry(line).or_default();
                entry.blanket |= suppression.blanket;
                entry.codes.extend(suppression.codes.iter().cloned());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_any_source() {
        let file = ParsedFile::from_source("a.php", "<?php $x = ;;; @@@");
        assert!(!file.stream().is_empty());
        assert_eq!(file.filename(), "a.php");
    }

    #[test]
    fn bare_ignore_is_blanket() {
        let src = "<?php\n// phpcs:ignore\n$wpdb->query( $sql );\n";
        let file = ParsedFile::from_source("a.php", src);
        assert!(file.is_suppressed_line(2, &["WordPress.DB.PreparedSQL.NotPrepared"]));
        assert!(file.is_suppressed_line(3, &["WordPress.DB.PreparedSQL.NotPrepared"]));
        assert!(!file.is_suppressed_line(4, &["WordPress.DB.PreparedSQL.NotPrepared"]));
    }

    #[test]
    fn scoped_ignore_matches_by_prefix() {
        let src = "<?php\n$wpdb->query( $sql ); // phpcs:ignore WordPress.DB.PreparedSQL\n";
        let file = ParsedFile::from_source("a.php", src);
        assert!(file.is_suppressed_line(2, &["WordPress.DB.PreparedSQL.NotPrepared"]));
        assert!(!file.is_suppressed_line(2, &["WordPress.Security.EscapeOutput"]));
    }

    #[test]
    fn ignore_reason_after_dashes_is_dropped() {
        let src = "<?php\n// phpcs:ignore WordPress.DB.PreparedSQL -- schema is static\n$wpdb->query( $sql );\n";
        let file = ParsedFile::from_source("a.php", src);
        assert!(file.is_suppressed_line(3, &["WordPress.DB.PreparedSQL.NotPrepared"]));
    }

    #[test]
    fn legacy_ignore_line_is_blanket() {
        let src = "<?php\necho $x; // @codingStandardsIgnoreLine\n";
        let file = ParsedFile::from_source("a.php", src);
        assert!(file.is_suppressed_line(2, &["anything"]));
    }

    #[test]
    fn unrelated_comments_do_not_suppress() {
        let src = "<?php\n// ordinary comment\necho $x;\n";
        let file = ParsedFile::from_source("a.php", src);
        assert!(!file.is_suppressed_line(3, &["anything"]));
    }
}
