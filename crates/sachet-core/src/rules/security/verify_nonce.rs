//! Detects misuses of `wp_verify_nonce()` where the verification result
//! cannot actually stop the request.

use crate::declare_rule;
use crate::diagnostic::Diagnostic;
use crate::navigator::Navigator;
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleMetadata, Severity};
use crate::token::{TokenKind, TokenStream};

/// Calls and keywords that abort processing when a nonce check fails.
const ERROR_TERMINATORS: &[&str] = &["wp_send_json_error", "wp_nonce_ays"];

declare_rule!(
    VerifyNonceRule,
    id = "S003",
    name = "verify-nonce",
    description = "wp_verify_nonce() must be used so a failed check stops the request",
    category = Security,
    severity = Error,
    examples = "// Bad\nwp_verify_nonce( $_POST['_wpnonce'], 'action' );\n\n// Good\nif ( ! wp_verify_nonce( $_POST['_wpnonce'], 'action' ) ) {\n    wp_nonce_ays( 'action' );\n}"
);

impl Rule for VerifyNonceRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        let stream = file.stream();
        let nav = Navigator::new(stream);
        let mut diagnostics = Vec::new();

        for pos in 0..stream.len() {
            if stream.kind(pos) != Some(TokenKind::Identifier)
                || stream.text(pos) != Some("wp_verify_nonce")
            {
                continue;
            }
            if let Some(message) = self.check_call(&nav, stream, pos) {
                let token = stream.get(pos).expect("position is in range");
                diagnostics.push(Diagnostic::new(
                    self.metadata.id,
                    Severity::Error,
                    message,
                    file.filename(),
                    token.line,
                    token.column,
                ));
            }
        }
        diagnostics
    }
}

impl VerifyNonceRule {
    fn check_call(
        &self,
        nav: &Navigator<'_>,
        stream: &TokenStream,
        pos: usize,
    ) -> Option<String> {
        let Some(keyword) = nav.condition_owner(pos) else {
            // Not inside a condition: a bare statement throws the result
            // away, which is almost always check_admin_referer() intent.
            if nav.is_return_statement(pos) || nav.is_assignment_statement(pos) {
                return None;
            }
            return Some(
                "Unconditional call to wp_verify_nonce(). Consider using check_admin_referer() instead."
                    .to_string(),
            );
        };

        let (open, close) = nav.condition_parens(keyword)?;
        let (expr_start, expr_end) = (open + 1, close);

        if nav.is_negated(pos) {
            // if ( $something && ! wp_verify_nonce() ): short-circuiting
            // means the nonce is never checked when $something is false.
            let and_pos = nav.find_and_op(expr_start, expr_end)?;
            let (scope_start, scope_end) = nav.scope_from_condition(keyword)?;
            if !self.scope_contains_error_terminator(stream, scope_start, scope_end) {
                return None;
            }
            if and_pos < pos {
                // The operand before the && might itself be a nonce check,
                // which will have been validated on its own.
                if self.contains_nonce_call(nav, expr_start, and_pos) {
                    return None;
                }
            } else {
                // Nonce call comes before the &&, so it always runs.
                return None;
            }
            return Some(format!(
                "Unsafe use of wp_verify_nonce() in expression {}.",
                nav.expression_as_string(expr_start, expr_end)
            ));
        }

        // if ( $something || wp_verify_nonce() ) { .. } else { die; }:
        // the else branch is skipped whenever $something is truthy.
        let else_pos = nav.else_of(keyword)?;
        let or_pos = nav.find_or_op(expr_start, expr_end)?;
        let (scope_start, scope_end) = nav.scope_from_condition(else_pos)?;
        if !self.scope_contains_error_terminator(stream, scope_start, scope_end) {
            return None;
        }
        let other_operand = if or_pos < pos {
            (expr_start, or_pos)
        } else {
            (or_pos, expr_end)
        };
        if self.contains_nonce_call(nav, other_operand.0, other_operand.1) {
            return None;
        }
        Some(format!(
            "Possibly unsafe use of wp_verify_nonce() in expression {}.",
            nav.expression_as_string(expr_start, expr_end)
        ))
    }

    fn contains_nonce_call(&self, nav: &Navigator<'_>, start: usize, end: usize) -> bool {
        nav.find_functions_in_expression(start, end)
            .iter()
            .any(|(_, name)| name == "wp_verify_nonce")
    }

    fn scope_contains_error_terminator(
        &self,
        stream: &TokenStream,
        start: usize,
        end: usize,
    ) -> bool {
        for pos in start..end.min(stream.len()) {
            match stream.kind(pos) {
                Some(TokenKind::Exit | TokenKind::Return) => return true,
                Some(TokenKind::Identifier) => {
                    if let Some(text) = stream.text(pos) {
                        if ERROR_TERMINATORS.contains(&text) {
                            return true;
                        }
                    }
                }
                _ => {}
            }
        }
        false
    }
}
