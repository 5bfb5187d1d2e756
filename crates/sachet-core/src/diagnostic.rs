//! Diagnostic values emitted by rules

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl Severity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "warning" | "warn" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }
}

/// How certain the rule is that the finding is a true positive. Token-level
/// analysis cannot always prove intent, so rules grade their own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    #[default]
    High,
}

impl Confidence {
    pub fn level(&self) -> u8 {
        match self {
            Confidence::High => 3,
            Confidence::Medium => 2,
            Confidence::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub rule_id: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            confidence: Confidence::High,
            message: message.into(),
            file: file.into(),
            line,
            column,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Expands a `%s` message template with positional arguments, in the order
/// they appear. Surplus placeholders are left in place.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut args = args.iter();
    while let Some(idx) = rest.find("%s") {
        out.push_str(&rest[..idx]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("%s"),
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_puts_error_above_warning() {
        assert!(Severity::Error > Severity::Warning);
    }

    #[test]
    fn severity_parses_common_spellings() {
        assert_eq!(Severity::parse("Error"), Some(Severity::Error));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("fatal"), None);
    }

    #[test]
    fn format_message_substitutes_in_order() {
        let msg = format_message("Unescaped parameter %s used in $wpdb->%s(%s)", &[
            "$sql",
            "query",
            "$sql",
        ]);
        assert_eq!(msg, "Unescaped parameter $sql used in $wpdb->query($sql)");
    }

    #[test]
    fn format_message_keeps_surplus_placeholders() {
        assert_eq!(format_message("%s and %s", &["a"]), "a and %s");
    }

    #[test]
    fn diagnostic_serializes_to_json() {
        let d = Diagnostic::new("S002", Severity::Warning, "msg", "a.php", 3, 7);
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["rule_id"], "S002");
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["confidence"], "high");
        assert!(value.get("suggestion").is_none());
    }

    #[test]
    fn diagnostic_builder_sets_fields() {
        let d = Diagnostic::new("S001", Severity::Error, "msg", "a.php", 3, 7)
            .with_suggestion("use $wpdb->prepare()")
            .with_confidence(Confidence::Medium);
        assert_eq!(d.rule_id, "S001");
        assert_eq!(d.line, 3);
        assert_eq!(d.suggestion.as_deref(), Some("use $wpdb->prepare()"));
        assert_eq!(d.confidence, Confidence::Medium);
    }
}
