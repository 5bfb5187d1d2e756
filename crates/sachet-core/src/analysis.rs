//! Analysis engine - wires the rule registry to parsed files.

use std::sync::Arc;

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::escaping::EscapingRuleSet;
use crate::parser::ParsedFile;
use crate::rules::commenting::{AllCapsCommentRule, TodoCommentRule};
use crate::rules::security::{
    DirectDbRule, OutputEscapingRule, SettingSanitizationRule, VerifyNonceRule,
};
use crate::rules::{Rule, RuleRegistry};

pub struct AnalysisEngine {
    registry: RuleRegistry,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Builds the engine with every rule registered, then applies the
    /// enable/disable and severity settings from `config`.
    pub fn with_config(config: &Config) -> Self {
        let mut registry = RuleRegistry::new();

        let sql = Arc::new(EscapingRuleSet::sql().extended(&config.escaping));
        let html = Arc::new(EscapingRuleSet::html().extended(&config.escaping));
        registry.register(Box::new(DirectDbRule::with_rules(sql)));
        registry.register(Box::new(OutputEscapingRule::with_rules(html)));
        registry.register(Box::new(VerifyNonceRule::new()));
        registry.register(Box::new(SettingSanitizationRule::new()));
        registry.register(Box::new(TodoCommentRule::new()));
        registry.register(Box::new(AllCapsCommentRule::new()));

        registry.configure(&config.rules);

        Self { registry }
    }

    /// Runs every enabled rule and drops diagnostics suppressed by an
    /// inline `phpcs:ignore` comment naming the rule.
    pub fn analyze(&self, file: &ParsedFile) -> Vec<Diagnostic> {
        tracing::debug!(file = file.filename(), "analyzing");
        let diagnostics: Vec<Diagnostic> = self
            .registry
            .run_all(file)
            .into_iter()
            .filter(|diagnostic| !self.is_suppressed(file, diagnostic))
            .collect();
        tracing::debug!(
            file = file.filename(),
            count = diagnostics.len(),
            "analysis complete"
        );
        diagnostics
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    fn is_suppressed(&self, file: &ParsedFile, diagnostic: &Diagnostic) -> bool {
        match self.registry.get_rule(&diagnostic.rule_id) {
            Some(rule) => {
                let metadata = rule.metadata();
                file.is_suppressed_line(diagnostic.line, &[metadata.id, metadata.name])
            }
            None => file.is_suppressed_line(diagnostic.line, &[&diagnostic.rule_id]),
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EscapingOverrides, RulesConfig};
    use crate::diagnostic::Severity;

    fn analyze(source: &str) -> Vec<Diagnostic> {
        let engine = AnalysisEngine::new();
        let file = ParsedFile::from_source("test.php", source);
        engine.analyze(&file)
    }

    #[test]
    fn engine_registers_all_rules() {
        let engine = AnalysisEngine::new();
        assert_eq!(engine.registry().len(), 6);
    }

    #[test]
    fn detects_issues_across_rules() {
        let src = "<?php\n// TODO: remove\necho $_GET['q'];\n";
        let diagnostics = analyze(src);
        let ids: Vec<&str> = diagnostics.iter().map(|d| d.rule_id.as_str()).collect();
        assert!(ids.contains(&"C001"));
        assert!(ids.contains(&"S002"));
    }

    #[test]
    fn clean_file_produces_no_diagnostics() {
        let src = "<?php\necho esc_html( get_the_title() );\n";
        assert!(analyze(src).is_empty());
    }

    #[test]
    fn inline_ignore_drops_diagnostic() {
        let src = "<?php\n// phpcs:ignore output-escaping\necho $_GET['q'];\n";
        assert!(analyze(src).is_empty());
    }

    #[test]
    fn blanket_ignore_drops_all_diagnostics_on_line() {
        let src = "<?php\n// phpcs:ignore\necho $_GET['q'];\n";
        assert!(analyze(src).is_empty());
    }

    #[test]
    fn ignore_for_other_rule_does_not_apply() {
        let src = "<?php\n// phpcs:ignore todo-comment\necho $_GET['q'];\n";
        assert_eq!(analyze(src).len(), 1);
    }

    #[test]
    fn disabled_rule_is_skipped() {
        let config = Config {
            rules: RulesConfig {
                disabled: vec!["output-escaping".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = AnalysisEngine::with_config(&config);
        let file = ParsedFile::from_source("test.php", "<?php echo $_GET['q'];");
        assert!(engine.analyze(&file).is_empty());
    }

    #[test]
    fn severity_override_applies() {
        let config = Config {
            rules: RulesConfig {
                severity: [(
                    "todo-comment".to_string(),
                    crate::config::SeverityValue::Error,
                )]
                .into_iter()
                .collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = AnalysisEngine::with_config(&config);
        let file = ParsedFile::from_source("test.php", "<?php // TODO: later");
        let diagnostics = engine.analyze(&file);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn extra_escaping_function_is_honored() {
        let config = Config {
            escaping: EscapingOverrides {
                extra_escaping_functions: vec!["my_esc".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = AnalysisEngine::with_config(&config);
        let file = ParsedFile::from_source("test.php", "<?php echo my_esc( $title );");
        assert!(engine.analyze(&file).is_empty());
    }
}
