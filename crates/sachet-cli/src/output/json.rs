//! JSON output formatter for diagnostic display
//!
//! Structured output for programmatic integration.

use sachet_core::diagnostic::{Diagnostic, Severity};
use sachet_core::rules::{RuleCategory, RuleRegistry};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Serialize)]
pub struct JsonOutput {
    pub version: &'static str,
    pub metadata: JsonMetadata,
    pub summary: JsonSummary,
    pub diagnostics: Vec<JsonDiagnostic>,
}

#[derive(Serialize)]
pub struct JsonMetadata {
    pub sachet_version: &'static str,
    pub working_directory: String,
    pub analyzed_path: String,
}

#[derive(Serialize)]
pub struct JsonSummary {
    pub total_files: usize,
    pub files_with_issues: usize,
    pub total_diagnostics: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
}

#[derive(Serialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
}

#[derive(Serialize)]
pub struct CategoryCounts {
    pub security: usize,
    pub commenting: usize,
}

#[derive(Serialize)]
pub struct JsonDiagnostic {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub severity: String,
    pub message: String,
    pub location: JsonLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Serialize)]
pub struct JsonLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

pub struct JsonFormatter<'a> {
    registry: Option<&'a RuleRegistry>,
}

impl<'a> JsonFormatter<'a> {
    pub fn new() -> Self {
        Self { registry: None }
    }

    pub fn with_registry(registry: &'a RuleRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    pub fn format(
        &self,
        diagnostics: &[Diagnostic],
        total_files: usize,
        analyzed_path: &str,
    ) -> String {
        let output = self.build_output(diagnostics, total_files, analyzed_path);
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }

    fn build_output(
        &self,
        diagnostics: &[Diagnostic],
        total_files: usize,
        analyzed_path: &str,
    ) -> JsonOutput {
        JsonOutput {
            version: "1.0",
            metadata: JsonMetadata {
                sachet_version: env!("CARGO_PKG_VERSION"),
                working_directory: std::env::current_dir()
                    .map(|p| p.to_string_lossy().to_string())
                    .unwrap_or_default(),
                analyzed_path: analyzed_path.to_string(),
            },
            summary: self.build_summary(diagnostics, total_files),
            diagnostics: diagnostics
                .iter()
                .map(|d| self.convert_diagnostic(d))
                .collect(),
        }
    }

    fn build_summary(&self, diagnostics: &[Diagnostic], total_files: usize) -> JsonSummary {
        let mut by_severity = SeverityCounts {
            error: 0,
            warning: 0,
        };
        let mut by_category = CategoryCounts {
            security: 0,
            commenting: 0,
        };
        let mut files_with_issues: HashMap<&str, bool> = HashMap::new();

        for diag in diagnostics {
            match diag.severity {
                Severity::Error => by_severity.error += 1,
                Severity::Warning => by_severity.warning += 1,
            }

            if let Some(category) = self.get_category(&diag.rule_id) {
                match category {
                    RuleCategory::Security => by_category.security += 1,
                    RuleCategory::Commenting => by_category.commenting += 1,
                }
            }

            files_with_issues.insert(&diag.file, true);
        }

        JsonSummary {
            total_files,
            files_with_issues: files_with_issues.len(),
            total_diagnostics: diagnostics.len(),
            by_severity,
            by_category,
        }
    }

    fn convert_diagnostic(&self, diag: &Diagnostic) -> JsonDiagnostic {
        let (rule_name, category) = self.get_rule_info(&diag.rule_id);

        JsonDiagnostic {
            rule_id: diag.rule_id.clone(),
            rule_name,
            category,
            severity: diag.severity.to_string(),
            message: diag.message.clone(),
            location: JsonLocation {
                file: diag.file.clone(),
                line: diag.line,
                column: diag.column,
            },
            suggestion: diag.suggestion.clone(),
        }
    }

    fn get_rule_info(&self, rule_id: &str) -> (Option<String>, Option<String>) {
        if let Some(registry) = self.registry {
            if let Some(rule) = registry.get_rule(rule_id) {
                let metadata = rule.metadata();
                let category = match metadata.category {
                    RuleCategory::Security => "security",
                    RuleCategory::Commenting => "commenting",
                };
                return (Some(metadata.name.to_string()), Some(category.to_string()));
            }
        }
        (None, None)
    }

    fn get_category(&self, rule_id: &str) -> Option<RuleCategory> {
        self.registry
            .and_then(|r| r.get_rule(rule_id))
            .map(|rule| rule.metadata().category)
    }
}

impl Default for JsonFormatter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_diagnostic() -> Diagnostic {
        Diagnostic::new(
            "S002",
            Severity::Warning,
            "Unescaped parameter $title used in 'echo'",
            "test.php",
            10,
            1,
        )
        .with_suggestion("Wrap the output in esc_html(), esc_attr() or esc_url()")
    }

    #[test]
    fn format_produces_valid_json() {
        let formatter = JsonFormatter::new();
        let diagnostics = vec![sample_diagnostic()];

        let output = formatter.format(&diagnostics, 5, "./src");

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["version"], "1.0");
        assert!(parsed["metadata"].is_object());
        assert!(parsed["summary"].is_object());
        assert!(parsed["diagnostics"].is_array());
    }

    #[test]
    fn format_includes_metadata() {
        let formatter = JsonFormatter::new();
        let diagnostics = vec![];

        let output = formatter.format(&diagnostics, 10, "./plugin");

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(parsed["metadata"]["sachet_version"].is_string());
        assert_eq!(parsed["metadata"]["analyzed_path"], "./plugin");
    }

    #[test]
    fn format_includes_summary() {
        let formatter = JsonFormatter::new();
        let diagnostics = vec![
            Diagnostic::new("S001", Severity::Error, "Error 1", "a.php", 1, 0),
            Diagnostic::new("S002", Severity::Warning, "Warning 1", "a.php", 2, 0),
            Diagnostic::new("C001", Severity::Warning, "Warning 2", "b.php", 1, 0),
        ];

        let output = formatter.format(&diagnostics, 10, "./src");

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["summary"]["total_files"], 10);
        assert_eq!(parsed["summary"]["files_with_issues"], 2);
        assert_eq!(parsed["summary"]["total_diagnostics"], 3);
        assert_eq!(parsed["summary"]["by_severity"]["error"], 1);
        assert_eq!(parsed["summary"]["by_severity"]["warning"], 2);
    }

    #[test]
    fn format_includes_diagnostic_details() {
        let formatter = JsonFormatter::new();
        let diagnostics = vec![sample_diagnostic()];

        let output = formatter.format(&diagnostics, 1, "./src");

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let diag = &parsed["diagnostics"][0];
        assert_eq!(diag["rule_id"], "S002");
        assert_eq!(diag["severity"], "warning");
        assert_eq!(diag["location"]["file"], "test.php");
        assert_eq!(diag["location"]["line"], 10);
        assert_eq!(diag["location"]["column"], 1);
        assert!(diag["suggestion"].as_str().unwrap().contains("esc_html"));
    }

    #[test]
    fn empty_diagnostics_produces_valid_output() {
        let formatter = JsonFormatter::new();
        let diagnostics: Vec<Diagnostic> = vec![];

        let output = formatter.format(&diagnostics, 0, ".");

        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["summary"]["total_diagnostics"], 0);
        assert!(parsed["diagnostics"].as_array().unwrap().is_empty());
    }
}
