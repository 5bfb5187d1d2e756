//! Detects unescaped data reaching page output.

use std::sync::Arc;

use crate::diagnostic::Diagnostic;
use crate::escaping::{EscapingCheck, EscapingRuleSet};
use crate::parser::ParsedFile;
use crate::rules::{Rule, RuleCategory, RuleMetadata, Severity};

pub struct OutputEscapingRule {
    metadata: RuleMetadata,
    rules: Arc<EscapingRuleSet>,
}

impl OutputEscapingRule {
    pub fn new() -> Self {
        Self::with_rules(Arc::new(EscapingRuleSet::html().clone()))
    }

    pub fn with_rules(rules: Arc<EscapingRuleSet>) -> Self {
        Self {
            metadata: RuleMetadata {
                id: "S002",
                name: "output-escaping",
                description: "Dynamic output must go through an escaping function",
                category: RuleCategory::Security,
                severity: Severity::Warning,
                docs_url: None,
                examples: Some(
                    "// Bad\necho $_GET['title'];\n\n// Good\necho esc_html( $_GET['title'] );",
                ),
            },
            rules,
        }
    }
}

impl Default for OutputEscapingRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for OutputEscapingRule {
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
                .with_suggestion("Wrap the output in esc_html(), esc_attr() or esc_url()")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Vec<Diagnostic> {
        let file = ParsedFile::from_source("test.php", source);
        OutputEscapingRule::new().check(&file)
    }

    #[test]
    fn superglobal_output_is_an_error() {
        let diagnostics = check("<?php echo $_REQUEST['q'];");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].rule_id, "S002");
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn plain_variable_output_is_a_warning() {
        let diagnostics = check("<?php echo $title;");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn escaped_output_passes() {
        assert!(check("<?php echo esc_html( $title );").is_empty());
    }

    #[test]
    fn sanitized_variable_passes() {
        let src = "<?php\n$title = esc_html( $_GET['title'] );\necho $title;\n";
        assert!(check(src).is_empty());
    }
}
