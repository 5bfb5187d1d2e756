//! Per-file taint state for variables
//!
//! Tracks which variables currently hold sanitized values. State is keyed by
//! the enclosing function body so a `$sql` inside one function never aliases
//! a `$sql` in another, with global code in its own bucket. Assignments
//! overwrite: the tracker keeps the latest state per key, not a branch-aware
//! lattice, and anything never recorded is looked up as `None` so callers
//! can fail closed.

use std::collections::HashMap;

use crate::token::TokenStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyState {
    Sanitized,
    Unsanitized,
}

/// Where a variable lives: global code or one function body, identified by
/// the position of its `function` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    Global,
    Function(usize),
}

impl ScopeKey {
    pub fn at(stream: &TokenStream, pos: usize) -> Self {
        match stream.innermost_function(pos) {
            Some(keyword) => ScopeKey::Function(keyword),
            None => ScopeKey::Global,
        }
    }
}

/// One recorded assignment, kept so diagnostics can point back at where a
/// variable picked up an unsafe value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// First token of the right-hand side.
    pub rhs: usize,
    pub state: SafetyState,
}

#[derive(Debug, Default)]
pub struct TaintTracker {
    entries: HashMap<(ScopeKey, String), SafetyState>,
    assignments: HashMap<(ScopeKey, String), Vec<Assignment>>,
}

impl TaintTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_sanitized(&mut self, scope: ScopeKey, key: &str) {
        self.entries
            .insert((scope, key.to_string()), SafetyState::Sanitized);
    }

    pub fn mark_unsanitized(&mut self, scope: ScopeKey, key: &str) {
        self.entries
            .insert((scope, key.to_string()), SafetyState::Unsanitized);
    }

    pub fn record_assignment(&mut self, scope: ScopeKey, key: &str, rhs: usize, state: SafetyState) {
        self.assignments
            .entry((scope, key.to_string()))
            .or_default()
            .push(Assignment { rhs, state });
    }

    /// Current state of a variable, `None` when it was never assigned in
    /// this scope.
    pub fn lookup(&self, scope: ScopeKey, key: &str) -> Option<SafetyState> {
        self.entries.get(&(scope, key.to_string())).copied()
    }

    pub fn is_sanitized(&self, scope: ScopeKey, key: &str) -> bool {
        self.lookup(scope, key) == Some(SafetyState::Sanitized)
    }

    /// Recorded assignments for a variable, oldest first.
    pub fn assignments(&self, scope: ScopeKey, key: &str) -> &[Assignment] {
        self.assignments
            .get(&(scope, key.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Most recent assignment that left the variable unsanitized.
    pub fn last_unsafe_assignment(&self, scope: ScopeKey, key: &str) -> Option<Assignment> {
        self.assignments(scope, key)
            .iter()
            .rev()
            .find(|a| a.state == SafetyState::Unsanitized)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::token::TokenKind;

    #[test]
    fn unknown_variable_has_no_state() {
        let tracker = TaintTracker::new();
        assert_eq!(tracker.lookup(ScopeKey::Global, "$x"), None);
        assert!(!tracker.is_sanitized(ScopeKey::Global, "$x"));
    }

    #[test]
    fn latest_assignment_wins() {
        let mut tracker = TaintTracker::new();
        tracker.mark_sanitized(ScopeKey::Global, "$x");
        assert!(tracker.is_sanitized(ScopeKey::Global, "$x"));
        tracker.mark_unsanitized(ScopeKey::Global, "$x");
        assert_eq!(
            tracker.lookup(ScopeKey::Global, "$x"),
            Some(SafetyState::Unsanitized)
        );
    }

    #[test]
    fn scopes_do_not_alias() {
        let mut tracker = TaintTracker::new();
        tracker.mark_unsanitized(ScopeKey::Function(3), "$sql");
        assert_eq!(tracker.lookup(ScopeKey::Global, "$sql"), None);
        assert_eq!(tracker.lookup(ScopeKey::Function(9), "$sql"), None);
    }

    #[test]
    fn scope_key_resolves_function_bodies() {
        let stream = tokenize("<?php $a = 1; function foo() { $b = 2; }");
        let global = (0..stream.len())
            .find(|&i| stream.text(i) == Some("$a"))
            .unwrap();
        assert_eq!(ScopeKey::at(&stream, global), ScopeKey::Global);

        let inner = (0..stream.len())
            .find(|&i| stream.text(i) == Some("$b"))
            .unwrap();
        let kw = (0..stream.len())
            .find(|&i| stream.kind(i) == Some(TokenKind::Function))
            .unwrap();
        assert_eq!(ScopeKey::at(&stream, inner), ScopeKey::Function(kw));
    }

    #[test]
    fn assignment_history_tracks_unsafe_origin() {
        let mut tracker = TaintTracker::new();
        tracker.record_assignment(ScopeKey::Global, "$x", 5, SafetyState::Unsanitized);
        tracker.record_assignment(ScopeKey::Global, "$x", 12, SafetyState::Sanitized);
        tracker.record_assignment(ScopeKey::Global, "$x", 20, SafetyState::Unsanitized);
        let last = tracker.last_unsafe_assignment(ScopeKey::Global, "$x").unwrap();
        assert_eq!(last.rhs, 20);
        assert_eq!(tracker.assignments(ScopeKey::Global, "$x").len(), 3);
    }
}
