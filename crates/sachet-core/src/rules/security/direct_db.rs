//! Detects unescaped data flowing into direct `$wpdb` queries.

use std::sync::Arc;

use crate::diagnostic::Diagnostic;
use crate::escaping::{EscapingCheck, EscapingRuleSet};
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleCategory, RuleMetadata, Severity};

pub struct DirectDbRule {
    metadata: RuleMetadata,
    rules: Arc<EscapingRuleSet>,
}

impl DirectDbRule {
    pub fn new() -> Self {
        Self::with_rules(Arc::new(EscapingRuleSet::sql().clone()))
    }

    /// Constructs the rule with a widened rule set, for projects that
    /// configure their own escaping helpers.
    pub fn with_rules(rules: Arc<EscapingRuleSet>) -> Self {
        Self {
            metadata: RuleMetadata {
                id: "S001",
                name: "direct-db-query",
                description: "Unescaped data must not reach $wpdb query methods",
                category: RuleCategory::Security,
                severity: Severity::Error,
                docs_url: None,
                examples: Some(
                    "// Bad\n$wpdb->query( \"SELECT * FROM t WHERE id = $id\" );\n\n// Good\n$wpdb->query( $wpdb->prepare( 'SELECT * FROM t WHERE id = %d', $id ) );",
                ),
            },
            rules,
        }
    }
}

impl Default for DirectDbRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for DirectDbRule {
    fn metadata(&self) -> &RuleMetadata {
        &self.metadata
    }

    fn check(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        EscapingCheck::new(&self.rules, file)
            .run()
            .into_iter()
            .map(|finding| {
                Diagnostic::new(
                    self.metadata.id,
                    finding.severity,
                    finding.message,
                    file.filename(),
                    finding.line,
                    finding.column,
                )
                .with_suggestion(
                    "Use $wpdb->prepare() with placeholders for all dynamic values",
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let file = ParsedFile::from_source("test.php", source);
        DirectDbRule::new().check(&file)
    }

    #[test]
    fn flags_interpolated_query() {
        let diagnostics = check("<?php $wpdb->query( \"SELECT * FROM t WHERE id = $id\" );");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "S001");
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert!(diagnostics[0].suggestion.as_deref().unwrap().contains("prepare"));
    }

    #[test]
    fn accepts_prepared_query() {
        let diagnostics =
            check("<?php $wpdb->query( $wpdb->prepare( 'SELECT * FROM t WHERE id = %d', $id ) );");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn diagnostic_points_at_the_sink() {
        let diagnostics = check("<?php\n\n$wpdb->get_results( \"SELECT $x\" );\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 3);
    }
}
