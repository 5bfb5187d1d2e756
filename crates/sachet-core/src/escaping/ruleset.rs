//! Function classification tables for the escaping analysis
//!
//! The classifier never guesses: every function name lands in exactly one
//! bucket, and anything not listed is treated as unsafe. The two built-in
//! rule sets encode long-standing WordPress review practice for SQL and for
//! HTML output respectively.

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::EscapingOverrides;

#[derive(Debug, Clone)]
pub struct EscapingRuleSet {
    /// Calls whose result is safe for this sink regardless of arguments.
    pub escaping_functions: HashSet<String>,
    /// Commonly mistaken for escaping functions; explicitly unsafe.
    pub not_escaping_functions: HashSet<String>,
    /// Safe exactly when every argument is safe.
    pub neutral_functions: HashSet<String>,
    /// Assumed safe; flagging these is noise.
    pub implicit_safe_functions: HashSet<String>,
    /// `$wpdb` methods that escape their arguments themselves.
    pub safe_methods: HashSet<String>,
    /// `$wpdb` methods whose first argument must be pre-escaped.
    pub unsafe_methods: HashSet<String>,
    /// Unsafe expressions matching these prefixes downgrade to a warning.
    pub warn_only_parameters: Vec<String>,
    /// Query prefixes that downgrade to a warning (no way to escape a table
    /// name in `CREATE TABLE`, so erroring there is unhelpful).
    pub warn_only_query_prefixes: Vec<String>,
    /// When non-empty, only expressions matching these prefixes are errors
    /// and everything else warns. Used by the output configuration, where
    /// direct superglobal output is the only certain defect.
    pub error_always_parameters: Vec<String>,
    /// Legacy rule names whose line suppressions downgrade our finding.
    pub suppression_aliases: Vec<String>,
    /// Whether output statements (`echo`, `print`, `exit`, `<?=`) are sinks.
    pub output_sinks: bool,
}

static SQL: LazyLock<EscapingRuleSet> = LazyLock::new(|| EscapingRuleSet {
    escaping_functions: set(&[
        "absint",
        "floatval",
        "intval",
        "json_encode",
        "like_escape",
        "wp_json_encode",
        "isset",
        "esc_sql",
        "wp_parse_id_list",
        "bp_esc_like",
        "sanitize_sql_orderby",
    ]),
    not_escaping_functions: set(&[
        "addslashes",
        "addcslashes",
        "sanitize_text_field",
        "sanitize_title",
        "sanitize_key",
        "filter_input",
        "esc_attr",
    ]),
    neutral_functions: set(&[
        "implode",
        "join",
        "array_keys",
        "array_values",
        "array_fill",
        "sprintf",
        "array_filter",
    ]),
    implicit_safe_functions: set(&[
        "gmdate",
        "current_time",
        "mktime",
        "get_post_types",
        "get_charset_collate",
        "get_blog_prefix",
        "get_post_stati",
        "count",
        "strtotime",
        "uniqid",
        "md5",
        "sha1",
        "rand",
        "mt_rand",
        "max",
        "table_name",
    ]),
    safe_methods: set(&["delete", "replace", "update", "insert", "prepare"]),
    unsafe_methods: set(&["query", "get_var", "get_col", "get_row", "get_results"]),
    warn_only_parameters: strings(&[
        "$table",
        "$table_name",
        "$table_prefix",
        "$column_name",
        "$this",
        "$order_by",
        "$orderby",
        "$where",
        "$wheres",
        "$join",
        "$joins",
        "$bp_prefix",
        "$where_sql",
        "$join_sql",
        "$from_sql",
        "$select_sql",
        "$meta_query_sql",
    ]),
    warn_only_query_prefixes: strings(&[
        "CREATE TABLE",
        "SHOW TABLE",
        "DROP TABLE",
        "TRUNCATE TABLE",
    ]),
    error_always_parameters: Vec::new(),
    suppression_aliases: strings(&[
        "WordPress.DB.PreparedSQL.NotPrepared",
        "WordPress.DB.PreparedSQL.InterpolatedNotPrepared",
        "WordPress.DB.DirectDatabaseQuery.DirectQuery",
        "DB call",
        "unprepared SQL",
        "PreparedSQLPlaceholders replacement count",
    ]),
    output_sinks: false,
});

static HTML: LazyLock<EscapingRuleSet> = LazyLock::new(|| EscapingRuleSet {
    escaping_functions: set(&[
        "esc_html",
        "esc_html__",
        "esc_html_x",
        "esc_html_e",
        "esc_attr",
        "esc_attr__",
        "esc_attr_x",
        "esc_attr_e",
        "esc_url",
        "esc_js",
        "esc_textarea",
        "sanitize_text_field",
        "intval",
        "absint",
        "json_encode",
        "wp_json_encode",
        "htmlspecialchars",
        "wp_kses",
        "wp_kses_post",
        "wp_kses_data",
        "tag_escape",
    ]),
    not_escaping_functions: set(&[
        "addslashes",
        "addcslashes",
        "filter_input",
        "wp_strip_all_tags",
        "esc_url_raw",
    ]),
    neutral_functions: set(&[
        "implode",
        "join",
        "array_keys",
        "array_values",
        "array_fill",
        "sprintf",
        "array_filter",
        "__",
        "_x",
        "date",
        "date_i18n",
        "get_the_date",
        "get_comment_time",
        "get_comment_date",
        "comments_number",
        "get_the_category_list",
        "get_header_image_tag",
        "get_the_tag_list",
        "trim",
    ]),
    implicit_safe_functions: set(&[
        "gmdate",
        "current_time",
        "mktime",
        "get_post_types",
        "get_charset_collate",
        "get_blog_prefix",
        "get_post_stati",
        "get_avatar",
        "get_search_query",
        "get_bloginfo",
        "get_the_id",
        "count",
        "strtotime",
        "uniqid",
        "md5",
        "sha1",
        "rand",
        "mt_rand",
        "max",
        "wp_get_attachment_image",
        "post_class",
        "wp_trim_words",
        "paginate_links",
        "selected",
        "checked",
        "disabled",
        "get_the_posts_pagination",
        "get_the_author_posts_link",
        "get_the_password_form",
        "get_the_tag_list",
        "get_the_post_thumbnail",
        "get_custom_logo",
        "plugin_dir_url",
        "admin_url",
        "get_admin_url",
        "get_field_description",
        "get_submit_button",
        "wp_star_rating",
        "get_settings_errors",
        "_draft_or_post_title",
        "_admin_search_query",
        "get_media_states",
        "get_post_states",
        "wp_readonly",
        "get_post_timestamp",
        "wp_get_code_editor_settings",
        "get_the_post_type_description",
        "has_custom_logo",
        "get_language_attributes",
        "get_the_archive_title",
        "get_the_time",
        "get_post_time",
        "get_the_modified_time",
        "get_the_modified_date",
        "get_archives_link",
        "get_calendar",
        "wp_nav_menu",
        "get_post_format",
        "mysql2date",
        "wp_create_nonce",
    ]),
    safe_methods: HashSet::new(),
    unsafe_methods: HashSet::new(),
    warn_only_parameters: Vec::new(),
    warn_only_query_prefixes: Vec::new(),
    error_always_parameters: strings(&["$_GET", "$_POST", "$_REQUEST", "$_COOKIE"]),
    suppression_aliases: strings(&[
        "WordPress.Security.EscapeOutput",
        "WordPress.XSS.EscapeOutput",
        "XSS ok",
    ]),
    output_sinks: true,
});

impl EscapingRuleSet {
    /// The rule set for data flowing into `$wpdb` query methods.
    pub fn sql() -> &'static EscapingRuleSet {
        &SQL
    }

    /// The rule set for data flowing into page output.
    pub fn html() -> &'static EscapingRuleSet {
        &HTML
    }

    /// A copy of this rule set widened by user configuration.
    pub fn extended(&self, overrides: &EscapingOverrides) -> EscapingRuleSet {
        let mut out = self.clone();
        for name in &overrides.extra_escaping_functions {
            out.escaping_functions.insert(name.to_ascii_lowercase());
        }
        for name in &overrides.extra_implicit_safe_functions {
            out.implicit_safe_functions.insert(name.to_ascii_lowercase());
        }
        for name in &overrides.extra_warn_only_parameters {
            out.warn_only_parameters.push(name.clone());
        }
        out
    }

    pub fn is_escaping(&self, name: &str) -> bool {
        self.escaping_functions.contains(name)
    }

    pub fn is_not_escaping(&self, name: &str) -> bool {
        self.not_escaping_functions.contains(name)
    }

    pub fn is_neutral(&self, name: &str) -> bool {
        self.neutral_functions.contains(name)
    }

    pub fn is_implicit_safe(&self, name: &str) -> bool {
        self.implicit_safe_functions.contains(name)
    }

    pub fn is_safe_method(&self, name: &str) -> bool {
        self.safe_methods.contains(name)
    }

    pub fn is_unsafe_method(&self, name: &str) -> bool {
        self.unsafe_methods.contains(name)
    }

    /// Whether an unsafe expression should warn rather than error. With an
    /// `error_always` list configured the logic inverts: everything warns
    /// except matches on that list.
    pub fn is_warning_parameter(&self, expression: &str) -> bool {
        if !self.error_always_parameters.is_empty() {
            return !prefix_match(&self.error_always_parameters, expression);
        }
        prefix_match(&self.warn_only_parameters, expression)
    }

    /// Whether a query's literal text starts with a warn-only prefix such as
    /// `CREATE TABLE`.
    pub fn is_warning_query(&self, query: &str) -> bool {
        let trimmed = query.trim_start_matches(|c| c == '\'' || c == '"');
        self.warn_only_query_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
    }
}

/// Prefix match with an identifier boundary, so `$table` covers
/// `$table['users']` and `$this` covers `$this->tablename`, but `$table`
/// does not cover `$tablespoon`.
fn prefix_match(prefixes: &[String], expression: &str) -> bool {
    prefixes.iter().any(|prefix| {
        expression.strip_prefix(prefix.as_str()).is_some_and(|rest| {
            !rest
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        })
    })
}

fn set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_classifies_known_functions() {
        let rules = EscapingRuleSet::sql();
        assert!(rules.is_escaping("esc_sql"));
        assert!(rules.is_not_escaping("esc_attr"));
        assert!(rules.is_neutral("implode"));
        assert!(rules.is_implicit_safe("current_time"));
        assert!(rules.is_unsafe_method("get_results"));
        assert!(rules.is_safe_method("prepare"));
        assert!(!rules.output_sinks);
    }

    #[test]
    fn html_classifies_known_functions() {
        let rules = EscapingRuleSet::html();
        assert!(rules.is_escaping("esc_html"));
        assert!(rules.is_not_escaping("esc_url_raw"));
        assert!(rules.is_neutral("__"));
        assert!(rules.output_sinks);
        assert!(rules.unsafe_methods.is_empty());
    }

    #[test]
    fn esc_attr_is_mode_dependent() {
        assert!(EscapingRuleSet::sql().is_not_escaping("esc_attr"));
        assert!(EscapingRuleSet::html().is_escaping("esc_attr"));
    }

    #[test]
    fn warning_parameters_match_on_boundaries() {
        let rules = EscapingRuleSet::sql();
        assert!(rules.is_warning_parameter("$table"));
        assert!(rules.is_warning_parameter("$table[users]"));
        assert!(rules.is_warning_parameter("$this->tablename"));
        assert!(!rules.is_warning_parameter("$tablespoon"));
        assert!(!rules.is_warning_parameter("$sql"));
    }

    #[test]
    fn html_errors_only_on_superglobals() {
        let rules = EscapingRuleSet::html();
        assert!(!rules.is_warning_parameter("$_GET[page]"));
        assert!(!rules.is_warning_parameter("$_POST"));
        assert!(rules.is_warning_parameter("$content"));
    }

    #[test]
    fn warning_queries_match_structural_prefixes() {
        let rules = EscapingRuleSet::sql();
        assert!(rules.is_warning_query("\"CREATE TABLE {$table} (id INT)\""));
        assert!(rules.is_warning_query("'DROP TABLE $t'"));
        assert!(!rules.is_warning_query("\"SELECT * FROM users\""));
    }

    #[test]
    fn extended_merges_overrides() {
        let overrides = EscapingOverrides {
            extra_escaping_functions: vec!["my_esc".into()],
            extra_implicit_safe_functions: vec!["my_helper".into()],
            extra_warn_only_parameters: vec!["$legacy".into()],
        };
        let rules = EscapingRuleSet::sql().extended(&overrides);
        assert!(rules.is_escaping("my_esc"));
        assert!(rules.is_implicit_safe("my_helper"));
        assert!(rules.is_warning_parameter("$legacy"));
        assert!(!EscapingRuleSet::sql().is_escaping("my_esc"));
    }
}
