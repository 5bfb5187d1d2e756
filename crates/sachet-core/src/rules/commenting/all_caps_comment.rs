use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleMetadata, Severity};
use crate::token::TokenKind;

declare_rule!(
    AllCapsCommentRule,
    id = "C002",
    name = "all-caps-comment",
    description = "Comments written entirely in capital letters read as shouting",
    category = Commenting,
    severity = Warning,
    examples = "// Bad\n// DO NOT REMOVE THIS\n\n// Good\n// Do not remove this"
);

impl Rule for AllCapsCommentRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        let stream = file.stream();
        let mut diagnostics = Vec::new();

        for token in stream.tokens() {
            if token.kind != TokenKind::Comment {
                continue;
            }
            let content = strip_comment_markers(&token.text);
            if content.chars().any(|c| c.is_ascii_alphabetic())
                && content.to_uppercase() == content
            {
                diagnostics.push(Diagnostic::new(
                    self.metadata.id,
                    Severity::Warning,
                    "Avoid using all capital letters in comments.".to_string(),
                    file.filename(),
                    token.line,
                    token.column,
                ));
            }
        }
        diagnostics
    }
}

fn strip_comment_markers(text: &str) -> String {
    let mut content = text.trim_start();
    for marker in ["//", "#", "/*"] {
        if let Some(rest) = content.strip_prefix(marker) {
            content = rest;
            break;
        }
    }
    content.trim_end_matches("*/").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let file = ParsedFile::from_source("test.php", source);
        AllCapsCommentRule::new().check(&file)
    }

    #[test]
    fn flags_all_caps_line_comment() {
        let diagnostics = check("<?php // DO NOT TOUCH\n$x = 1;\n");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("capital letters"));
    }

    #[test]
    fn flags_all_caps_hash_comment() {
        assert_eq!(check("<?php # WARNING").len(), 1);
    }

    #[test]
    fn flags_all_caps_block_comment() {
        assert_eq!(check("<?php /* LEGACY CODE */").len(), 1);
    }

    #[test]
    fn allows_mixed_case() {
        assert!(check("<?php // Do NOT touch").is_empty());
    }

    #[test]
    fn allows_comment_without_letters() {
        assert!(check("<?php // ---- 123 ----").is_empty());
    }

    #[test]
    fn ignores_doc_comments() {
        assert!(check("<?php /** SUMMARY */").is_empty());
    }
}
