//! Expression navigation over a [`TokenStream`]
//!
//! The escaping checks and the nonce rule all reason about "the rest of this
//! expression", "the condition this call sits in" or "the statement this
//! token belongs to". This module centralizes those walks so every rule
//! agrees on where expressions start and stop.

use crate::token::{TokenKind, TokenStream};
use crate::variables::render_variable;

/// One argument of a function call, as a trimmed token range.
/// `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub start: usize,
    pub end: usize,
}

pub struct Navigator<'a> {
    stream: &'a TokenStream,
}

impl<'a> Navigator<'a> {
    pub fn new(stream: &'a TokenStream) -> Self {
        Self { stream }
    }

    pub fn stream(&self) -> &'a TokenStream {
        self.stream
    }

    /// Exclusive end of the expression starting at `start`: the position of
    /// the first `;`, top-level `,`, close tag, or unbalanced closing
    /// bracket. Balanced bracket groups are jumped over whole.
    pub fn find_end_of_expression(&self, start: usize) -> usize {
        let mut pos = start;
        while pos < self.stream.len() {
            let kind = match self.stream.kind(pos) {
                Some(kind) => kind,
                None => break,
            };
            match kind {
                TokenKind::Semicolon | TokenKind::Comma | TokenKind::CloseTag => return pos,
                _ if kind.is_open_bracket() => match self.stream.matching(pos) {
                    Some(close) => pos = close + 1,
                    None => return pos,
                },
                _ if kind.is_close_bracket() => return pos,
                _ => pos += 1,
            }
        }
        self.stream.len()
    }

    /// Like [`find_end_of_expression`](Self::find_end_of_expression) but
    /// runs through commas, covering a whole statement.
    pub fn find_end_of_statement(&self, start: usize) -> usize {
        let mut pos = start;
        while pos < self.stream.len() {
            let kind = match self.stream.kind(pos) {
                Some(kind) => kind,
                None => break,
            };
            match kind {
                TokenKind::Semicolon | TokenKind::CloseTag => return pos,
                _ if kind.is_open_bracket() => match self.stream.matching(pos) {
                    Some(close) => pos = close + 1,
                    None => return pos,
                },
                _ if kind.is_close_bracket() => return pos,
                _ => pos += 1,
            }
        }
        self.stream.len()
    }

    /// First token of the statement containing `pos`, walking backwards over
    /// balanced bracket groups.
    pub fn find_start_of_statement(&self, pos: usize) -> usize {
        let mut i = pos;
        loop {
            let kind = match self.stream.kind(i) {
                Some(kind) => kind,
                None => return pos,
            };
            let boundary = matches!(
                kind,
                TokenKind::Semicolon
                    | TokenKind::OpenCurly
                    | TokenKind::CloseCurly
                    | TokenKind::OpenTag
                    | TokenKind::OpenTagWithEcho
                    | TokenKind::CloseTag
            ) && i != pos;
            if boundary {
                return self.stream.next_non_empty(i + 1).unwrap_or(pos);
            }
            if kind.is_close_bracket() && i != pos {
                match self.stream.matching(i) {
                    Some(open) => {
                        if open == 0 {
                            return self.stream.next_non_empty(0).unwrap_or(pos);
                        }
                        i = open - 1;
                        continue;
                    }
                    None => return self.stream.next_non_empty(i + 1).unwrap_or(pos),
                }
            }
            if i == 0 {
                return self.stream.next_non_empty(0).unwrap_or(pos);
            }
            i -= 1;
        }
    }

    /// If the variable at `pos` is the target of an assignment, returns the
    /// position of the assignment operator. Walks through array indexes and
    /// property accesses first, so `$foo['bar'] = ..` counts.
    pub fn is_assignment(&self, pos: usize) -> Option<usize> {
        let (_, end) = render_variable(self.stream, pos)?;
        let op = self.stream.next_non_empty(end + 1)?;
        if self.stream.kind(op)?.is_assignment_op() {
            Some(op)
        } else {
            None
        }
    }

    /// True when the statement containing `pos` is an assignment, even if
    /// `pos` sits inside nested call parentheses.
    pub fn is_assignment_statement(&self, pos: usize) -> bool {
        let parens = self.stream.enclosing_parens(pos);
        let anchor = parens.first().map(|&(open, _)| open).unwrap_or(pos);
        let start = self.find_start_of_statement(anchor);
        self.stream.kind(start) == Some(TokenKind::Variable) && self.is_assignment(start).is_some()
    }

    /// True when the statement containing `pos` starts with `return`.
    pub fn is_return_statement(&self, pos: usize) -> bool {
        let parens = self.stream.enclosing_parens(pos);
        let anchor = parens.first().map(|&(open, _)| open).unwrap_or(pos);
        let start = self.find_start_of_statement(anchor);
        self.stream.kind(start) == Some(TokenKind::Return)
    }

    /// Renders the token range `[start, end)` to display text: trivia
    /// comments are dropped and whitespace runs collapse to single spaces.
    pub fn expression_as_string(&self, start: usize, end: usize) -> String {
        let mut out = String::new();
        for i in start..end.min(self.stream.len()) {
            let token = match self.stream.get(i) {
                Some(token) => token,
                None => break,
            };
            match token.kind {
                TokenKind::Comment | TokenKind::DocComment => {}
                TokenKind::Whitespace => {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                }
                _ => out.push_str(&token.text),
            }
        }
        out.trim().to_string()
    }

    /// If `pos` sits inside the parenthesized condition of a control
    /// structure, returns the position of the owning keyword.
    pub fn condition_owner(&self, pos: usize) -> Option<usize> {
        for (open, _) in self.stream.enclosing_parens(pos) {
            if let Some(owner) = self.stream.paren_owner(open) {
                return Some(owner);
            }
        }
        None
    }

    /// The parenthesized condition of a control keyword, as the positions
    /// of its opening and closing parentheses.
    pub fn condition_parens(&self, keyword: usize) -> Option<(usize, usize)> {
        let open = self.stream.next_non_empty(keyword + 1)?;
        if self.stream.kind(open)? != TokenKind::OpenParen {
            return None;
        }
        let close = self.stream.matching(open)?;
        Some((open, close))
    }

    /// The body controlled by a condition keyword: the brace-delimited scope
    /// when one exists, otherwise the single bare statement after the
    /// condition. Returned as an exclusive token range.
    pub fn scope_from_condition(&self, keyword: usize) -> Option<(usize, usize)> {
        if let Some((open, close)) = self.stream.scope_braces(keyword) {
            return Some((open + 1, close));
        }
        let (_, close) = self.condition_parens(keyword)?;
        let start = self.stream.next_non_empty(close + 1)?;
        Some((start, self.find_end_of_statement(start)))
    }

    /// True when the `if`/`elseif` at `keyword` has an attached `else` or
    /// `elseif` branch.
    pub fn has_else(&self, keyword: usize) -> bool {
        let Some((_, close)) = self.stream.scope_braces(keyword) else {
            return false;
        };
        matches!(
            self.stream
                .next_non_empty(close + 1)
                .and_then(|i| self.stream.kind(i)),
            Some(TokenKind::Else | TokenKind::ElseIf)
        )
    }

    /// The `else` keyword attached to the `if` at `keyword`, if any.
    pub fn else_of(&self, keyword: usize) -> Option<usize> {
        let (_, close) = self.stream.scope_braces(keyword)?;
        let next = self.stream.next_non_empty(close + 1)?;
        if self.stream.kind(next)? == TokenKind::Else {
            Some(next)
        } else {
            None
        }
    }

    pub fn expression_contains_and(&self, start: usize, end: usize) -> bool {
        self.find_and_op(start, end).is_some()
    }

    pub fn expression_contains_or(&self, start: usize, end: usize) -> bool {
        self.find_or_op(start, end).is_some()
    }

    /// Position of the first top-level `&&`/`and` in `[start, end)`.
    pub fn find_and_op(&self, start: usize, end: usize) -> Option<usize> {
        self.find_op(start, end, TokenKind::is_and_op)
    }

    /// Position of the first top-level `||`/`or` in `[start, end)`.
    pub fn find_or_op(&self, start: usize, end: usize) -> Option<usize> {
        self.find_op(start, end, TokenKind::is_or_op)
    }

    /// Scans `[start, end)` for an operator, jumping over nested bracket
    /// groups so operators inside call arguments do not count.
    fn find_op(&self, start: usize, end: usize, pred: fn(TokenKind) -> bool) -> Option<usize> {
        let mut pos = start;
        while pos < end.min(self.stream.len()) {
            let kind = self.stream.kind(pos)?;
            if pred(kind) {
                return Some(pos);
            }
            if kind.is_open_bracket() {
                match self.stream.matching(pos) {
                    Some(close) if close < end => pos = close + 1,
                    _ => return None,
                }
                continue;
            }
            pos += 1;
        }
        None
    }

    /// True when the token at `pos` is preceded by a `!` negation.
    pub fn is_negated(&self, pos: usize) -> bool {
        match pos
            .checked_sub(1)
            .and_then(|prev| self.stream.prev_non_empty(prev))
        {
            Some(prev) => self.stream.kind(prev) == Some(TokenKind::BooleanNot),
            None => false,
        }
    }

    /// First real (long-form) ternary `?` in `[start, end)` together with
    /// its matching `:`. Nested bracket groups are jumped; `?:` short
    /// ternaries do not count.
    pub fn find_ternary(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let mut pos = start;
        let limit = end.min(self.stream.len());
        while pos < limit {
            let kind = self.stream.kind(pos)?;
            if kind.is_open_bracket() {
                match self.stream.matching(pos) {
                    Some(close) if close < limit => {
                        pos = close + 1;
                        continue;
                    }
                    _ => return None,
                }
            }
            if kind == TokenKind::Ternary {
                let after = self.stream.next_non_empty(pos + 1)?;
                if self.stream.kind(after) == Some(TokenKind::TernaryElse) {
                    // Elvis operator, no then-branch to split on.
                    pos = after + 1;
                    continue;
                }
                let colon = self.matching_ternary_else(pos + 1, limit)?;
                return Some((pos, colon));
            }
            pos += 1;
        }
        None
    }

    fn matching_ternary_else(&self, start: usize, end: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut pos = start;
        while pos < end {
            let kind = self.stream.kind(pos)?;
            if kind.is_open_bracket() {
                match self.stream.matching(pos) {
                    Some(close) if close < end => {
                        pos = close + 1;
                        continue;
                    }
                    _ => return None,
                }
            }
            match kind {
                TokenKind::Ternary => depth += 1,
                TokenKind::TernaryElse => {
                    if depth == 0 {
                        return Some(pos);
                    }
                    depth -= 1;
                }
                _ => {}
            }
            pos += 1;
        }
        None
    }

    /// Function calls in `[start, end)`: each `identifier (` pair, with the
    /// name lowercased. Nested call arguments are included; the scan does
    /// not descend selectively.
    pub fn find_functions_in_expression(&self, start: usize, end: usize) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        for pos in start..end.min(self.stream.len()) {
            if self.stream.kind(pos) != Some(TokenKind::Identifier) {
                continue;
            }
            let Some(next) = self.stream.next_non_empty(pos + 1) else {
                continue;
            };
            if self.stream.kind(next) == Some(TokenKind::OpenParen) {
                if let Some(text) = self.stream.text(pos) {
                    out.push((pos, text.to_ascii_lowercase()));
                }
            }
        }
        out
    }

    /// Closing parenthesis of the call whose name sits at `name_pos`.
    pub fn end_of_function_call(&self, name_pos: usize) -> Option<usize> {
        let open = self.stream.next_non_empty(name_pos + 1)?;
        if self.stream.kind(open)? != TokenKind::OpenParen {
            return None;
        }
        self.stream.matching(open)
    }

    /// Splits the arguments of a call at its opening parenthesis into
    /// trimmed token ranges, honoring nested brackets.
    pub fn call_parameters(&self, open: usize) -> Vec<Param> {
        let Some(close) = self.stream.matching(open) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut item_start = open + 1;
        let mut pos = open + 1;
        while pos < close {
            let Some(kind) = self.stream.kind(pos) else {
                break;
            };
            if kind.is_open_bracket() {
                match self.stream.matching(pos) {
                    Some(end) if end < close => {
                        pos = end + 1;
                        continue;
                    }
                    _ => break,
                }
            }
            if kind == TokenKind::Comma {
                if let Some(param) = self.trim_param(item_start, pos) {
                    out.push(param);
                }
                item_start = pos + 1;
            }
            pos += 1;
        }
        if let Some(param) = self.trim_param(item_start, close) {
            out.push(param);
        }
        out
    }

    fn trim_param(&self, start: usize, end: usize) -> Option<Param> {
        let first = (start..end).find(|&i| {
            self.stream
                .kind(i)
                .map(|k| !k.is_empty())
                .unwrap_or(false)
        })?;
        let last = (start..end).rev().find(|&i| {
            self.stream
                .kind(i)
                .map(|k| !k.is_empty())
                .unwrap_or(false)
        })?;
        Some(Param {
            start: first,
            end: last + 1,
        })
    }
}
