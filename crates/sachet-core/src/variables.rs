//! Variable rendering
//!
//! Turns a run of tokens starting at a `$variable` into the canonical key
//! used for taint bookkeeping, and extracts the same canonical keys out of
//! interpolated double-quoted strings so both sides of an assignment agree
//! on naming. Canonical keys strip index quoting: `$foo['bar']`, `$foo[bar]`
//! and the interpolated `"$foo[bar]"` all map to `$foo[bar]`.

use std::sync::LazyLock;

use regex::Regex;

use crate::token::{TokenKind, TokenStream};

/// Hard cap on tokens consumed per variable, so malformed input cannot make
/// the renderer walk the rest of the file.
const MAX_VARIABLE_TOKENS: usize = 200;

/// Renders the variable expression starting at `pos` (which must be a
/// `Variable` token) into its canonical key, returning the key and the last
/// token position it covers.
///
/// Array indexes are appended with quotes stripped, property accesses as
/// `->name`, and numeric property accesses (`->0`, seen on unpacked query
/// rows) as `[0]`. A method call ends the variable: `$a->b()` renders as
/// just `$a`.
pub fn render_variable(stream: &TokenStream, pos: usize) -> Option<(String, usize)> {
    if stream.kind(pos)? != TokenKind::Variable {
        return None;
    }
    let mut key = stream.text(pos)?.to_string();
    let mut end = pos;
    for _ in 0..MAX_VARIABLE_TOKENS {
        let next = match stream.next_non_empty(end + 1) {
            Some(next) => next,
            None => break,
        };
        match stream.kind(next)? {
            TokenKind::OpenSquare => {
                let close = stream.matching(next)?;
                key.push('[');
                key.push_str(&render_index(stream, next, close));
                key.push(']');
                end = close;
            }
            TokenKind::ObjectOperator => {
                let prop = stream.next_non_empty(next + 1)?;
                match stream.kind(prop)? {
                    TokenKind::Identifier => {
                        // A following open paren makes this a method call,
                        // which is no longer a plain variable.
                        if let Some(after) = stream.next_non_empty(prop + 1) {
                            if stream.kind(after) == Some(TokenKind::OpenParen) {
                                break;
                            }
                        }
                        key.push_str("->");
                        key.push_str(stream.text(prop)?);
                        end = prop;
                    }
                    TokenKind::IntLiteral => {
                        key.push('[');
                        key.push_str(stream.text(prop)?);
                        key.push(']');
                        end = prop;
                    }
                    _ => break,
                }
            }
            _ => break,
        }
    }
    Some((key, end))
}

fn render_index(stream: &TokenStream, open: usize, close: usize) -> String {
    let mut out = String::new();
    for i in open + 1..close {
        let token = match stream.get(i) {
            Some(token) => token,
            None => break,
        };
        if token.kind.is_empty() {
            continue;
        }
        if token.kind == TokenKind::ConstantString {
            out.push_str(strip_quotes(&token.text));
        } else {
            out.push_str(&token.text);
        }
    }
    out
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '\'' || c == '"')
}

static INTERPOLATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\{?([a-zA-Z_\x80-\x{10FFFF}][a-zA-Z0-9_\x80-\x{10FFFF}]*)((?:\[[^\]]+\])*)((?:->[a-zA-Z_\x80-\x{10FFFF}][a-zA-Z0-9_\x80-\x{10FFFF}]*)*)",
    )
    .expect("interpolation pattern is valid")
});

/// Canonical keys of every variable interpolated into a double-quoted
/// string or heredoc body, in order of first appearance.
pub fn interpolated_variables(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in INTERPOLATED.captures_iter(text) {
        let name = &caps[1];
        let indexes: String = caps[2]
            .chars()
            .filter(|&c| c != '\'' && c != '"' && c != '{' && c != '}')
            .collect();
        let props = &caps[3];
        let key = format!("${name}{indexes}{props}");
        if !out.contains(&key) {
            out.push(key);
        }
    }
    out
}
