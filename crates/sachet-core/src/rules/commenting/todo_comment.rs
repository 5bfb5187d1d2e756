use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleMetadata, Severity};
use crate::token::TokenKind;

declare_rule!(
    TodoCommentRule,
    id = "C001",
    name = "todo-comment",
    description = "TODO comments should be resolved or tracked in an issue",
    category = Commenting,
    severity = Warning,
    examples = "// Bad\n// TODO: handle the error case\n\n// Good\n// Error case is handled by the caller, see #142"
);

impl Rule for TodoCommentRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        let stream = file.stream();
        let mut diagnostics = Vec::new();

        for token in stream.tokens() {
            if !matches!(token.kind, TokenKind::Comment | TokenKind::DocComment) {
                continue;
            }
            if token.text.to_lowercase().contains("todo:") {
                diagnostics.push(Diagnostic::new(
                    self.metadata.id,
                    Severity::Warning,
                    "Avoid \"TODO\" comment.".to_string(),
                    file.filename(),
                    token.line,
                    token.column,
                ));
            }
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let file = ParsedFile::from_source("test.php", source);
        TodoCommentRule::new().check(&file)
    }

    #[test]
    fn flags_todo_comment() {
        let diagnostics = check("<?php\n// TODO: fix this later\n$x = 1;\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
    }

    #[test]
    fn flags_lowercase_todo() {
        assert_eq!(check("<?php // todo: tidy up").len(), 1);
    }

    #[test]
    fn flags_todo_in_doc_comment() {
        assert_eq!(check("<?php /** TODO: document params */").len(), 1);
    }

    #[test]
    fn ignores_todo_without_colon() {
        assert!(check("<?php // todos are tracked elsewhere").is_empty());
    }

    #[test]
    fn ignores_plain_comment() {
        assert!(check("<?php // nothing to see here").is_empty());
    }
}
