//! Checks that `register_setting()` supplies a real sanitization callback.

use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::navigator::Navigator;
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleMetadata, Severity};
use crate::token::TokenKind;

declare_rule!(
    SettingSanitizationRule,
    id = "S004",
    name = "setting-sanitization",
    description = "register_setting() must pass a sanitization callback",
    category = Security,
    severity = Error,
    examples = "// Bad\nregister_setting( 'group', 'option' );\n\n// Good\nregister_setting( 'group', 'option', 'sanitize_text_field' );"
);

impl Rule for SettingSanitizationRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        let stream = file.stream();
        let nav = Navigator::new(stream);
        let mut diagnostics = Vec::new();

        for pos in 0..stream.len() {
            if stream.kind(pos) != Some(TokenKind::Identifier)
                || stream.text(pos) != Some("register_setting")
            {
                continue;
            }
            // Skip method calls and static calls that share the name.
            if pos > 0 {
                if let Some(prev) = stream.prev_non_empty(pos - 1) {
                    if matches!(
                        stream.kind(prev),
                        Some(TokenKind::ObjectOperator | TokenKind::DoubleColon)
                    ) {
                        continue;
                    }
                }
            }
            let Some(open) = stream.next_non_empty(pos + 1) else {
                continue;
            };
            if stream.kind(open) != Some(TokenKind::OpenParen) {
                continue;
            }

            if let Some(message) = self.check_parameters(&nav, open) {
                let token = stream.get(pos).expect("position is in range");
                diagnostics.push(
                    Diagnostic::new(
                        self.metadata.id,
                        Severity::Error,
                        message,
                        file.filename(),
                        token.line,
                        token.column,
                    )
                    .with_suggestion(
                        "Pass a sanitization callback such as sanitize_text_field or absint",
                    ),
                );
            }
        }
        diagnostics
    }
}

impl SettingSanitizationRule {
    fn check_parameters(&self, nav: &Navigator<'_>, open: usize) -> Option<String> {
        let params = nav.call_parameters(open);
        if params.len() < 3 {
            return Some("Sanitization missing for register_setting().".to_string());
        }
        let callback = params[2];
        let text = nav.expression_as_string(callback.start, callback.end);
        let stripped = text.trim_matches(|c| c == '\'' || c == '"');
        let lowered = stripped.to_lowercase();
        if stripped.parse::<f64>().is_ok() || lowered == "true" || lowered == "false" {
            return Some(
                "Invalid sanitization in third parameter of register_setting().".to_string(),
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let file = ParsedFile::from_source("test.php", source);
        SettingSanitizationRule::new().check(&file)
    }

    #[test]
    fn missing_third_parameter_is_flagged() {
        let diagnostics = check("<?php register_setting( 'group', 'option' );");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("Sanitization missing"));
    }

    #[test]
    fn callback_name_passes() {
        assert!(check("<?php register_setting( 'group', 'option', 'absint' );").is_empty());
    }

    #[test]
    fn array_args_pass() {
        let src = "<?php register_setting( 'group', 'option', array( 'sanitize_callback' => 'absint' ) );";
        assert!(check(src).is_empty());
    }

    #[test]
    fn boolean_callback_is_flagged() {
        let diagnostics = check("<?php register_setting( 'group', 'option', true );");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("Invalid sanitization"));
    }

    #[test]
    fn numeric_callback_is_flagged() {
        let diagnostics = check("<?php register_setting( 'group', 'option', 1 );");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("Invalid sanitization"));
    }

    #[test]
    fn method_call_with_same_name_is_ignored() {
        assert!(check("<?php $settings->register_setting( 'group', 'option' );").is_empty());
    }

    #[test]
    fn quoted_boolean_is_flagged() {
        let diagnostics = check("<?php register_setting( 'group', 'option', 'true' );");
        assert_eq!(diagnostics.len(), 1);
    }
}
