//! Token model for PHP source files
//!
//! The lexer maps PHP's stringly-typed token zoo into the closed [`TokenKind`]
//! enum once at ingestion; everything downstream dispatches on the enum.
//! A [`TokenStream`] is an indexed, immutable view over one file's tokens plus
//! the structural metadata (bracket matching, condition owners, scopes) that
//! the navigator and the escaping checks rely on.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    InlineHtml,
    OpenTag,
    OpenTagWithEcho,
    CloseTag,

    Variable,
    Identifier,

    ConstantString,
    DoubleQuotedString,
    Heredoc,
    IntLiteral,
    FloatLiteral,
    True,
    False,
    Null,

    Echo,
    Print,
    Exit,
    Return,
    If,
    ElseIf,
    Else,
    Foreach,
    As,
    While,
    For,
    Function,

    DoubleArrow,
    ObjectOperator,
    DoubleColon,

    OpenParen,
    CloseParen,
    OpenSquare,
    CloseSquare,
    OpenCurly,
    CloseCurly,

    Semicolon,
    Comma,
    Concat,

    Equal,
    PlusEqual,
    MinusEqual,
    MulEqual,
    DivEqual,
    ModEqual,
    ConcatEqual,
    CoalesceEqual,

    BooleanAnd,
    BooleanOr,
    LogicalAnd,
    LogicalOr,
    BooleanNot,

    Ternary,
    TernaryElse,

    IntCast,
    FloatCast,
    BoolCast,
    StringCast,
    ArrayCast,

    Ampersand,
    Minus,
    Plus,

    Comment,
    DocComment,
    Whitespace,

    /// Anything the engine has no use for: arithmetic, comparisons, misc.
    Other,
}

impl TokenKind {
    /// Tokens skipped by every `next_non_empty`-style scan.
    pub fn is_empty(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::DocComment
        )
    }

    pub fn is_assignment_op(self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::PlusEqual
                | TokenKind::MinusEqual
                | TokenKind::MulEqual
                | TokenKind::DivEqual
                | TokenKind::ModEqual
                | TokenKind::ConcatEqual
                | TokenKind::CoalesceEqual
        )
    }

    pub fn is_and_op(self) -> bool {
        matches!(self, TokenKind::BooleanAnd | TokenKind::LogicalAnd)
    }

    pub fn is_or_op(self) -> bool {
        matches!(self, TokenKind::BooleanOr | TokenKind::LogicalOr)
    }

    /// Casts that coerce to a numeric or boolean value, which is safe for any
    /// sink regardless of the operand.
    pub fn is_safe_cast(self) -> bool {
        matches!(
            self,
            TokenKind::IntCast | TokenKind::FloatCast | TokenKind::BoolCast
        )
    }

    pub fn is_open_bracket(self) -> bool {
        matches!(
            self,
            TokenKind::OpenParen | TokenKind::OpenSquare | TokenKind::OpenCurly
        )
    }

    pub fn is_close_bracket(self) -> bool {
        matches!(
            self,
            TokenKind::CloseParen | TokenKind::CloseSquare | TokenKind::CloseCurly
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
    /// For bracket tokens: the position of the matching opener/closer.
    pub matching: Option<usize>,
}

/// One function/closure body, used to partition variable taint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionScope {
    pub keyword: usize,
    pub body_open: usize,
    pub body_close: usize,
}

#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    /// Open parenthesis position -> owning control keyword position.
    owners: HashMap<usize, usize>,
    /// Control keyword position -> brace-delimited body (open, close).
    scopes: HashMap<usize, (usize, usize)>,
    functions: Vec<FunctionScope>,
}

impl TokenStream {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        link_brackets(&mut tokens);
        let mut stream = Self {
            tokens,
            owners: HashMap::new(),
            scopes: HashMap::new(),
            functions: Vec::new(),
        };
        stream.link_structure();
        stream
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Token> {
        self.tokens.get(pos)
    }

    pub fn kind(&self, pos: usize) -> Option<TokenKind> {
        self.tokens.get(pos).map(|t| t.kind)
    }

    pub fn text(&self, pos: usize) -> Option<&str> {
        self.tokens.get(pos).map(|t| t.text.as_str())
    }

    pub fn line(&self, pos: usize) -> Option<usize> {
        self.tokens.get(pos).map(|t| t.line)
    }

    pub fn matching(&self, pos: usize) -> Option<usize> {
        self.tokens.get(pos).and_then(|t| t.matching)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// First non-empty token at or after `from`.
    pub fn next_non_empty(&self, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| !self.tokens[i].kind.is_empty())
    }

    /// First non-empty token at or before `from`.
    pub fn prev_non_empty(&self, from: usize) -> Option<usize> {
        (0..=from.min(self.tokens.len().checked_sub(1)?))
            .rev()
            .find(|&i| !self.tokens[i].kind.is_empty())
    }

    /// The control keyword owning an open parenthesis, if any.
    pub fn paren_owner(&self, open: usize) -> Option<usize> {
        self.owners.get(&open).copied()
    }

    /// The brace-delimited body recorded for a control keyword.
    pub fn scope_braces(&self, keyword: usize) -> Option<(usize, usize)> {
        self.scopes.get(&keyword).copied()
    }

    pub fn functions(&self) -> &[FunctionScope] {
        &self.functions
    }

    /// Innermost function body containing `pos`, or `None` for global code.
    pub fn innermost_function(&self, pos: usize) -> Option<usize> {
        self.functions
            .iter()
            .filter(|f| f.body_open < pos && pos < f.body_close)
            .max_by_key(|f| f.body_open)
            .map(|f| f.keyword)
    }

    /// Parenthesis pairs enclosing `pos`, outermost first. Computed on demand
    /// with a single forward scan; positions in a lint pass are cold enough
    /// that caching is not worth the bookkeeping.
    pub fn enclosing_parens(&self, pos: usize) -> Vec<(usize, usize)> {
        let mut stack = Vec::new();
        let mut out = Vec::new();
        for (i, token) in self.tokens.iter().enumerate() {
            if i >= pos {
                break;
            }
            match token.kind {
                TokenKind::OpenParen => stack.push(i),
                TokenKind::CloseParen => {
                    stack.pop();
                }
                _ => {}
            }
        }
        for open in stack {
            if let Some(close) = self.matching(open) {
                if close > pos {
                    out.push((open, close));
                }
            }
        }
        out
    }

    fn link_structure(&mut self) {
        self.link_condition_owners();
        self.link_function_bodies();
    }

    fn link_condition_owners(&mut self) {
        let positions: Vec<usize> = (0..self.tokens.len()).collect();
        for &i in &positions {
            let kind = self.tokens[i].kind;
            let is_control = matches!(
                kind,
                TokenKind::If
                    | TokenKind::ElseIf
                    | TokenKind::Foreach
                    | TokenKind::While
                    | TokenKind::For
            );
            if is_control {
                if let Some(open) = self.next_non_empty(i + 1) {
                    if self.tokens[open].kind == TokenKind::OpenParen {
                        self.owners.insert(open, i);
                        if let Some(close) = self.matching(open) {
                            if let Some(brace) = self.next_non_empty(close + 1) {
                                if self.tokens[brace].kind == TokenKind::OpenCurly {
                                    if let Some(end) = self.matching(brace) {
                                        self.scopes.insert(i, (brace, end));
                                    }
                                }
                            }
                        }
                    }
                }
            } else if kind == TokenKind::Else {
                if let Some(brace) = self.next_non_empty(i + 1) {
                    if self.tokens[brace].kind == TokenKind::OpenCurly {
                        if let Some(end) = self.matching(brace) {
                            self.scopes.insert(i, (brace, end));
                        }
                    }
                }
            }
        }
    }

    fn link_function_bodies(&mut self) {
        for i in 0..self.tokens.len() {
            if self.tokens[i].kind != TokenKind::Function {
                continue;
            }
            if let Some((open, close)) = self.find_function_body(i) {
                self.scopes.insert(i, (open, close));
                self.functions.push(FunctionScope {
                    keyword: i,
                    body_open: open,
                    body_close: close,
                });
            }
        }
    }

    /// Walks `function [&][name] ( params ) [use ( .. )] [: type] {` to the
    /// body brace. Abstract declarations (terminated by `;`) yield `None`.
    fn find_function_body(&self, keyword: usize) -> Option<(usize, usize)> {
        let mut pos = self.next_non_empty(keyword + 1)?;
        let mut limit = 50usize;
        loop {
            limit = limit.checked_sub(1)?;
            match self.tokens[pos].kind {
                TokenKind::OpenCurly => {
                    let close = self.matching(pos)?;
                    return Some((pos, close));
                }
                TokenKind::Semicolon => return None,
                TokenKind::OpenParen => {
                    let close = self.matching(pos)?;
                    pos = self.next_non_empty(close + 1)?;
                }
                _ => {
                    pos = self.next_non_empty(pos + 1)?;
                }
            }
        }
    }
}

fn link_brackets(tokens: &mut [Token]) {
    let mut parens = Vec::new();
    let mut squares = Vec::new();
    let mut curlies = Vec::new();
    for i in 0..tokens.len() {
        match tokens[i].kind {
            TokenKind::OpenParen => parens.push(i),
            TokenKind::OpenSquare => squares.push(i),
            TokenKind::OpenCurly => curlies.push(i),
            TokenKind::CloseParen => pair(tokens, &mut parens, i),
            TokenKind::CloseSquare => pair(tokens, &mut squares, i),
            TokenKind::CloseCurly => pair(tokens, &mut curlies, i),
            _ => {}
        }
    }
}

fn pair(tokens: &mut [Token], stack: &mut Vec<usize>, close: usize) {
    // Unbalanced closers keep `matching == None`; callers treat that as the
    // "not found" sentinel rather than an error.
    if let Some(open) = stack.pop() {
        tokens[open].matching = Some(close);
        tokens[close].matching = Some(open);
    }
}
