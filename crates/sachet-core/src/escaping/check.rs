//! The expression walk at the heart of the escaping analysis
//!
//! A single forward pass over the token stream. Assignments update the
//! taint tracker as they are encountered; sink calls check their argument
//! span against the state accumulated so far. The walk is approximate on
//! purpose: it is branch-insensitive (the latest assignment wins regardless
//! of control flow) and it fails closed, treating anything it cannot prove
//! safe as unsafe.

use std::collections::HashSet;

use crate::diagnostic::{Severity, format_message};
use crate::escaping::EscapingRuleSet;
use crate::navigator::Navigator;
use crate::parser::ParsedFile;
use crate::taint::{SafetyState, ScopeKey, TaintTracker};
use crate::token::{TokenKind, TokenStream};
use crate::variables::{interpolated_variables, render_variable};

/// How many assignment hops the context trail follows.
const MAX_UNWIND_DEPTH: usize = 3;
/// Cap on context lines attached to one finding.
const MAX_UNWIND_LINES: usize = 6;

/// One unsafe data flow into a sink.
#[derive(Debug, Clone)]
pub struct Finding {
    pub sink: usize,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub message: String,
}

pub struct EscapingCheck<'a> {
    rules: &'a EscapingRuleSet,
    file: &'a ParsedFile,
    tracker: TaintTracker,
}

impl<'a> EscapingCheck<'a> {
    pub fn new(rules: &'a EscapingRuleSet, file: &'a ParsedFile) -> Self {
        Self {
            rules,
            file,
            tracker: TaintTracker::new(),
        }
    }

    fn stream(&self) -> &'a TokenStream {
        self.file.stream()
    }

    pub fn run(mut self) -> Vec<Finding> {
        let stream = self.stream();
        let mut findings = Vec::new();
        for pos in 0..stream.len() {
            match stream.kind(pos) {
                Some(TokenKind::Variable) => {
                    let nav = Navigator::new(stream);
                    if let Some(op) = nav.is_assignment(pos) {
                        self.handle_assignment(pos, op);
                        continue;
                    }
                    if let Some(next) = stream.next_non_empty(pos + 1) {
                        if stream.kind(next) == Some(TokenKind::As) {
                            self.handle_foreach(pos, next);
                            continue;
                        }
                    }
                }
                Some(TokenKind::Identifier) if stream.text(pos) == Some("array_walk") => {
                    self.handle_array_walk(pos);
                }
                _ => {}
            }
            if let Some(finding) = self.check_sink(pos) {
                findings.push(finding);
            }
        }
        findings
    }

    /// Classifies the right-hand side and records the new state of the
    /// target variable. `.=` with a safe value leaves existing state alone:
    /// appending something escaped does not clean the prefix.
    fn handle_assignment(&mut self, var_pos: usize, op: usize) {
        let stream = self.stream();
        let Some((key, _)) = render_variable(stream, var_pos) else {
            return;
        };
        let scope = ScopeKey::at(stream, var_pos);
        let Some(rhs) = stream.next_non_empty(op + 1) else {
            return;
        };
        if self.check_expression(rhs, None).is_none() {
            if stream.kind(op) != Some(TokenKind::ConcatEqual) {
                self.tracker.mark_sanitized(scope, &key);
                self.tracker
                    .record_assignment(scope, &key, rhs, SafetyState::Sanitized);
            }
        } else {
            self.tracker.mark_unsanitized(scope, &key);
            self.tracker
                .record_assignment(scope, &key, rhs, SafetyState::Unsanitized);
        }
    }

    /// `foreach ( $source as $item )` assigns elements of the source to the
    /// loop variable, so the loop variable inherits the source's safety.
    fn handle_foreach(&mut self, source: usize, as_pos: usize) {
        let stream = self.stream();
        let Some(mut target) = stream.next_non_empty(as_pos + 1) else {
            return;
        };
        if stream.kind(target) == Some(TokenKind::Ampersand) {
            match stream.next_non_empty(target + 1) {
                Some(next) => target = next,
                None => return,
            }
        }
        if let Some(lookahead) = stream.next_non_empty(target + 1) {
            if stream.kind(lookahead) == Some(TokenKind::DoubleArrow) {
                match stream.next_non_empty(lookahead + 1) {
                    Some(value) => target = value,
                    None => return,
                }
                if stream.kind(target) == Some(TokenKind::Ampersand) {
                    match stream.next_non_empty(target + 1) {
                        Some(next) => target = next,
                        None => return,
                    }
                }
            }
        }
        if stream.kind(target) != Some(TokenKind::Variable) {
            return;
        }
        let Some((key, _)) = render_variable(stream, target) else {
            return;
        };
        let scope = ScopeKey::at(stream, target);
        if self.check_expression(source, Some(as_pos)).is_none() {
            self.tracker.mark_sanitized(scope, &key);
        } else {
            self.tracker.mark_unsanitized(scope, &key);
            self.tracker
                .record_assignment(scope, &key, source, SafetyState::Unsanitized);
        }
    }

    /// `array_walk( $var, 'escaping_fn' )` applies the callback to every
    /// element, so a recognized escaping callback sanitizes the array.
    fn handle_array_walk(&mut self, pos: usize) {
        let stream = self.stream();
        let nav = Navigator::new(stream);
        let Some(open) = stream.next_non_empty(pos + 1) else {
            return;
        };
        if stream.kind(open) != Some(TokenKind::OpenParen) {
            return;
        }
        let params = nav.call_parameters(open);
        if params.len() < 2 {
            return;
        }
        let callback = nav
            .expression_as_string(params[1].start, params[1].end)
            .trim_matches(|c| c == '\'' || c == '"')
            .to_ascii_lowercase();
        if !self.rules.is_escaping(&callback) {
            return;
        }
        let target = params[0].start;
        if stream.kind(target) != Some(TokenKind::Variable) {
            return;
        }
        if let Some((key, _)) = render_variable(stream, target) {
            let scope = ScopeKey::at(stream, target);
            self.tracker.mark_sanitized(scope, &key);
        }
    }

    /// If the token at `pos` opens a sink, checks the sink's argument span
    /// and produces at most one finding for it.
    fn check_sink(&self, pos: usize) -> Option<Finding> {
        let stream = self.stream();
        let kind = stream.kind(pos)?;
        match kind {
            TokenKind::Identifier => self.check_method_sink(pos),
            TokenKind::Echo | TokenKind::Print | TokenKind::OpenTagWithEcho
                if self.rules.output_sinks =>
            {
                self.check_output_sink(pos)
            }
            TokenKind::Exit if self.rules.output_sinks => {
                // Bare `exit;` outputs nothing.
                let open = stream.next_non_empty(pos + 1)?;
                if stream.kind(open) != Some(TokenKind::OpenParen) {
                    return None;
                }
                let nav = Navigator::new(stream);
                if nav.call_parameters(open).is_empty() {
                    return None;
                }
                self.check_output_sink(pos)
            }
            _ => None,
        }
    }

    fn check_method_sink(&self, pos: usize) -> Option<Finding> {
        let stream = self.stream();
        let nav = Navigator::new(stream);
        let method = stream.text(pos)?.to_ascii_lowercase();
        if !self.rules.is_unsafe_method(&method) || !self.is_wpdb_method_call(pos) {
            return None;
        }
        let open = stream.next_non_empty(pos + 1)?;
        if stream.kind(open) != Some(TokenKind::OpenParen) {
            return None;
        }
        // Only the first parameter carries the query.
        let first = *nav.call_parameters(open).first()?;
        let unsafe_ptr = self.check_expression(first.start, Some(first.end))?;
        let unsafe_expr = self.unsafe_expression_as_string(unsafe_ptr);
        let param_text = nav.expression_as_string(first.start, first.end);
        let note = self.not_escaping_note(unsafe_ptr);
        let context = self.unwind_unsafe_assignments(unsafe_ptr);
        let token = stream.get(pos)?;
        Some(Finding {
            sink: pos,
            line: token.line,
            column: token.column,
            severity: self.decide_severity(&unsafe_expr, &param_text, token.line),
            message: format_message(
                "Unescaped parameter %s used in $wpdb->%s(%s)%s%s",
                &[&unsafe_expr, &method, &param_text, &note, &context],
            ),
        })
    }

    fn check_output_sink(&self, pos: usize) -> Option<Finding> {
        let stream = self.stream();
        let start = stream.next_non_empty(pos + 1)?;
        let unsafe_ptr = self.check_expression(start, None)?;
        let unsafe_expr = self.unsafe_expression_as_string(unsafe_ptr);
        let note = self.not_escaping_note(unsafe_ptr);
        let context = self.unwind_unsafe_assignments(unsafe_ptr);
        let token = stream.get(pos)?;
        Some(Finding {
            sink: pos,
            line: token.line,
            column: token.column,
            severity: self.decide_severity(&unsafe_expr, &unsafe_expr, token.line),
            message: format_message(
                "Unescaped parameter %s used in %s%s%s",
                &[&unsafe_expr, token.text.trim(), &note, &context],
            ),
        })
    }

    fn is_wpdb_method_call(&self, pos: usize) -> bool {
        let stream = self.stream();
        let Some(arrow) = pos
            .checked_sub(1)
            .and_then(|prev| stream.prev_non_empty(prev))
        else {
            return false;
        };
        if stream.kind(arrow) != Some(TokenKind::ObjectOperator) {
            return false;
        }
        arrow
            .checked_sub(1)
            .and_then(|prev| stream.prev_non_empty(prev))
            .is_some_and(|recv| {
                stream.kind(recv) == Some(TokenKind::Variable)
                    && stream.text(recv) == Some("$wpdb")
            })
    }

    fn decide_severity(&self, unsafe_expr: &str, param_text: &str, line: usize) -> Severity {
        let aliases: Vec<&str> = self
            .rules
            .suppression_aliases
            .iter()
            .map(String::as_str)
            .collect();
        if self.rules.is_warning_parameter(unsafe_expr)
            || self.file.is_suppressed_line(line, &aliases)
            || self.rules.is_warning_query(param_text)
        {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    /// Checks the span `[start, end)` (defaulting to the rest of the
    /// statement) and returns the position of the first element that cannot
    /// be proven safe, or `None` when the whole span is safe.
    pub fn check_expression(&self, start: usize, end: Option<usize>) -> Option<usize> {
        let stream = self.stream();
        let nav = Navigator::new(stream);
        let start = stream.next_non_empty(start)?;
        let end = end.unwrap_or_else(|| nav.find_end_of_statement(start));
        if start >= end {
            return None;
        }

        // A ternary contributes whichever arm is taken, so both must be
        // safe; the condition itself never reaches the sink.
        if let Some((question, colon)) = nav.find_ternary(start, end) {
            if let Some(then_start) = stream.next_non_empty(question + 1) {
                if then_start < colon {
                    if let Some(ptr) = self.check_expression(then_start, Some(colon)) {
                        return Some(ptr);
                    }
                }
            }
            if let Some(else_start) = stream.next_non_empty(colon + 1) {
                if else_start < end {
                    return self.check_expression(else_start, Some(end));
                }
            }
            return None;
        }

        let mut pos = start;
        while pos < end {
            match self.classify_operand(pos, end) {
                Err(unsafe_ptr) => return Some(unsafe_ptr),
                Ok(next) => {
                    let Some(joiner) = stream.next_non_empty(next) else {
                        return None;
                    };
                    if joiner >= end {
                        return None;
                    }
                    match stream.kind(joiner) {
                        // Concatenation is safe iff every operand is;
                        // commas join `echo` arguments the same way.
                        Some(TokenKind::Concat) | Some(TokenKind::Comma) => {
                            match stream.next_non_empty(joiner + 1) {
                                Some(next_operand) if next_operand < end => pos = next_operand,
                                _ => return None,
                            }
                        }
                        _ => return Some(joiner),
                    }
                }
            }
        }
        None
    }

    /// Classifies one operand. `Ok(next)` means the operand is safe and the
    /// walk continues at `next`; `Err(ptr)` pinpoints the unsafe element.
    fn classify_operand(&self, pos: usize, end: usize) -> Result<usize, usize> {
        let stream = self.stream();
        let kind = stream.kind(pos).ok_or(pos)?;
        match kind {
            TokenKind::ConstantString
            | TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => Ok(pos + 1),

            TokenKind::DoubleQuotedString | TokenKind::Heredoc => {
                let text = stream.text(pos).ok_or(pos)?;
                let scope = ScopeKey::at(stream, pos);
                let all_safe = interpolated_variables(text)
                    .iter()
                    .all(|key| self.tracker.is_sanitized(scope, key));
                if all_safe { Ok(pos + 1) } else { Err(pos) }
            }

            // A numeric or boolean coercion is safe whatever the operand;
            // same for `!`, whose result is a boolean.
            kind if kind.is_safe_cast() => Ok(self.skip_operand(pos + 1, end)),
            TokenKind::BooleanNot => Ok(self.skip_operand(pos + 1, end)),

            // String and array casts change the type, not the content.
            TokenKind::StringCast | TokenKind::ArrayCast | TokenKind::Ampersand => {
                match stream.next_non_empty(pos + 1) {
                    Some(next) if next < end => self.classify_operand(next, end),
                    _ => Err(pos),
                }
            }

            TokenKind::Minus | TokenKind::Plus => {
                match stream.next_non_empty(pos + 1).map(|n| (n, stream.kind(n))) {
                    Some((n, Some(TokenKind::IntLiteral | TokenKind::FloatLiteral))) => Ok(n + 1),
                    _ => Err(pos),
                }
            }

            TokenKind::OpenParen => {
                let close = stream.matching(pos).ok_or(pos)?;
                if let Some(inner) = stream.next_non_empty(pos + 1) {
                    if inner < close {
                        if let Some(ptr) = self.check_expression(inner, Some(close)) {
                            return Err(ptr);
                        }
                    }
                }
                Ok(close + 1)
            }

            TokenKind::Variable => self.classify_variable(pos),

            TokenKind::Identifier => {
                let open = match stream.next_non_empty(pos + 1) {
                    Some(open) if stream.kind(open) == Some(TokenKind::OpenParen) => open,
                    // A bare identifier is a constant; defined constants are
                    // trusted.
                    _ => return Ok(pos + 1),
                };
                let name = stream.text(pos).ok_or(pos)?.to_ascii_lowercase();
                let close = stream.matching(open).ok_or(pos)?;
                self.classify_call(pos, &name, open, close)
            }

            _ => Err(pos),
        }
    }

    fn classify_variable(&self, pos: usize) -> Result<usize, usize> {
        let stream = self.stream();
        let (key, vend) = render_variable(stream, pos).ok_or(pos)?;

        // Method call: classify by method name rather than variable state.
        if let Some(arrow) = stream.next_non_empty(vend + 1) {
            if stream.kind(arrow) == Some(TokenKind::ObjectOperator) {
                if let Some(name_pos) = stream.next_non_empty(arrow + 1) {
                    if let Some(open) = stream.next_non_empty(name_pos + 1) {
                        if stream.kind(open) == Some(TokenKind::OpenParen) {
                            let name = stream
                                .text(name_pos)
                                .ok_or(pos)?
                                .to_ascii_lowercase();
                            let close = stream.matching(open).ok_or(pos)?;
                            if self.rules.is_safe_method(&name)
                                || self.rules.is_escaping(&name)
                                || self.rules.is_implicit_safe(&name)
                            {
                                return Ok(close + 1);
                            }
                            if self.rules.is_neutral(&name) {
                                return self.classify_neutral_args(open, close);
                            }
                            return Err(pos);
                        }
                    }
                }
            }
        }

        let scope = ScopeKey::at(stream, pos);
        if self.tracker.is_sanitized(scope, &key) {
            Ok(vend + 1)
        } else {
            Err(pos)
        }
    }

    fn classify_call(
        &self,
        name_pos: usize,
        name: &str,
        open: usize,
        close: usize,
    ) -> Result<usize, usize> {
        if self.rules.is_escaping(name) || self.rules.is_implicit_safe(name) {
            return Ok(close + 1);
        }
        if self.rules.is_neutral(name) {
            return self.classify_neutral_args(open, close);
        }
        // `not_escaping` and unknown functions both fail; the distinction
        // only matters for messaging elsewhere.
        Err(name_pos)
    }

    /// Neutral calls pass their arguments through, so each argument is
    /// checked in turn.
    fn classify_neutral_args(&self, open: usize, close: usize) -> Result<usize, usize> {
        let nav = Navigator::new(self.stream());
        for param in nav.call_parameters(open) {
            if let Some(ptr) = self.check_expression(param.start, Some(param.end)) {
                return Err(ptr);
            }
        }
        Ok(close + 1)
    }

    /// Consumes one operand without classifying it, for positions covered by
    /// a safe cast.
    fn skip_operand(&self, pos: usize, end: usize) -> usize {
        let stream = self.stream();
        let Some(p) = stream.next_non_empty(pos) else {
            return end;
        };
        if p >= end {
            return end;
        }
        match stream.kind(p) {
            Some(TokenKind::OpenParen) => stream.matching(p).map(|c| c + 1).unwrap_or(end),
            Some(TokenKind::Variable) => {
                let vend = render_variable(stream, p).map(|(_, e)| e).unwrap_or(p);
                if let Some(arrow) = stream.next_non_empty(vend + 1) {
                    if stream.kind(arrow) == Some(TokenKind::ObjectOperator) {
                        if let Some(name_pos) = stream.next_non_empty(arrow + 1) {
                            if let Some(open) = stream.next_non_empty(name_pos + 1) {
                                if stream.kind(open) == Some(TokenKind::OpenParen) {
                                    return stream.matching(open).map(|c| c + 1).unwrap_or(end);
                                }
                            }
                        }
                    }
                }
                vend + 1
            }
            Some(TokenKind::Identifier) => match stream.next_non_empty(p + 1) {
                Some(open) if stream.kind(open) == Some(TokenKind::OpenParen) => {
                    stream.matching(open).map(|c| c + 1).unwrap_or(end)
                }
                _ => p + 1,
            },
            _ => p + 1,
        }
    }

    /// Note appended when the unsafe element is a call to a function that is
    /// known not to escape for this context, as opposed to one the rule set
    /// has never heard of.
    fn not_escaping_note(&self, ptr: usize) -> String {
        let stream = self.stream();
        if stream.kind(ptr) != Some(TokenKind::Identifier) {
            return String::new();
        }
        let Some(name) = stream.text(ptr) else {
            return String::new();
        };
        let name = name.to_ascii_lowercase();
        if self.rules.is_not_escaping(&name) {
            format!(" ({name}() does not escape for this context)")
        } else {
            String::new()
        }
    }

    /// Display text for the unsafe element. For interpolated strings this
    /// is the first unsanitized variable inside, not the whole literal:
    /// `"SELECT * FROM $table"` reports `$table`.
    fn unsafe_expression_as_string(&self, ptr: usize) -> String {
        let stream = self.stream();
        let nav = Navigator::new(stream);
        match stream.kind(ptr) {
            Some(TokenKind::Variable) => {
                let end = render_variable(stream, ptr)
                    .map(|(_, e)| e)
                    .unwrap_or(ptr);
                nav.expression_as_string(ptr, end + 1)
            }
            Some(TokenKind::DoubleQuotedString | TokenKind::Heredoc) => {
                let text = stream.text(ptr).unwrap_or_default();
                let scope = ScopeKey::at(stream, ptr);
                interpolated_variables(text)
                    .into_iter()
                    .find(|key| !self.tracker.is_sanitized(scope, key))
                    .unwrap_or_else(|| text.to_string())
            }
            Some(TokenKind::Identifier) => match nav.end_of_function_call(ptr) {
                Some(close) => nav.expression_as_string(ptr, close + 1),
                None => stream.text(ptr).unwrap_or_default().to_string(),
            },
            _ => stream.text(ptr).unwrap_or_default().to_string(),
        }
    }

    /// Builds the assignment trail for an unsafe variable: where it picked
    /// up the unsafe value, recursively, within tight depth and line caps.
    /// Returns a display suffix, empty when there is nothing to add.
    fn unwind_unsafe_assignments(&self, ptr: usize) -> String {
        let mut lines = Vec::new();
        let mut visited = HashSet::new();
        self.unwind(ptr, &mut lines, &mut visited, MAX_UNWIND_DEPTH);
        if lines.is_empty() {
            String::new()
        } else {
            format!("\n{}", lines.join("\n"))
        }
    }

    fn unwind(
        &self,
        ptr: usize,
        lines: &mut Vec<String>,
        visited: &mut HashSet<(ScopeKey, String)>,
        depth: usize,
    ) {
        if depth == 0 || lines.len() >= MAX_UNWIND_LINES {
            return;
        }
        let stream = self.stream();
        let nav = Navigator::new(stream);

        let keys: Vec<(usize, String)> = match stream.kind(ptr) {
            Some(TokenKind::Variable) => match render_variable(stream, ptr) {
                Some((key, _)) => vec![(ptr, key)],
                None => return,
            },
            Some(TokenKind::DoubleQuotedString | TokenKind::Heredoc) => {
                let text = stream.text(ptr).unwrap_or_default();
                interpolated_variables(text)
                    .into_iter()
                    .map(|key| (ptr, key))
                    .collect()
            }
            _ => return,
        };

        for (at, key) in keys {
            let scope = ScopeKey::at(stream, at);
            if !visited.insert((scope, key.clone())) {
                continue;
            }
            let Some(assignment) = self.tracker.last_unsafe_assignment(scope, &key) else {
                continue;
            };
            if lines.len() >= MAX_UNWIND_LINES {
                return;
            }
            let rhs_end = nav.find_end_of_expression(assignment.rhs);
            let rhs_text = nav.expression_as_string(assignment.rhs, rhs_end);
            let line = stream.line(assignment.rhs).unwrap_or(0);
            lines.push(format!(
                "{key} assigned unsafe value at line {line}: {rhs_text}"
            ));
            for i in assignment.rhs..rhs_end {
                if matches!(
                    stream.kind(i),
                    Some(
                        TokenKind::Variable
                            | TokenKind::DoubleQuotedString
                            | TokenKind::Heredoc
                    )
                ) {
                    self.unwind(i, lines, visited, depth - 1);
                }
            }
        }
    }
}
