//! Minimal PHP tokenizer
//!
//! Produces the [`TokenStream`] the analysis engine walks. This is a token
//! producer, not a parser: it recognizes exactly the lexical shapes the
//! engine dispatches on (tags, strings, heredocs, variables, the operator
//! set, casts) and folds everything else into `TokenKind::Other`. It never
//! fails; unrecognized bytes become single-character `Other` tokens.

use crate::token::{Token, TokenKind, TokenStream};

pub fn tokenize(source: &str) -> TokenStream {
    let lexer = Lexer::new(source);
    TokenStream::new(lexer.run())
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        let mut in_php = false;
        while self.pos < self.chars.len() {
            if in_php {
                in_php = self.lex_php_token();
            } else {
                in_php = self.lex_inline_html();
            }
        }
        self.tokens
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, needle: &str) -> bool {
        needle
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == Some(c))
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize, column: usize) {
        self.tokens.push(Token {
            kind,
            text,
            line,
            column,
            matching: None,
        });
    }

    /// Consumes `count` chars into a token of the given kind.
    fn take(&mut self, kind: TokenKind, count: usize) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        for _ in 0..count {
            match self.advance() {
                Some(c) => text.push(c),
                None => break,
            }
        }
        self.push(kind, text, line, column);
    }

    /// Returns `true` once an open tag has been consumed.
    fn lex_inline_html(&mut self) -> bool {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while self.pos < self.chars.len() {
            if self.starts_with("<?php") || self.starts_with("<?=") {
                break;
            }
            if let Some(c) = self.advance() {
                text.push(c);
            }
        }
        if !text.is_empty() {
            self.push(TokenKind::InlineHtml, text, line, column);
        }
        if self.starts_with("<?php") {
            self.take(TokenKind::OpenTag, 5);
            true
        } else if self.starts_with("<?=") {
            self.take(TokenKind::OpenTagWithEcho, 3);
            true
        } else {
            false
        }
    }

    /// Returns `false` when a close tag switches back to inline HTML.
    fn lex_php_token(&mut self) -> bool {
        let c = match self.peek(0) {
            Some(c) => c,
            None => return false,
        };

        if self.starts_with("?>") {
            self.take(TokenKind::CloseTag, 2);
            return false;
        }

        if c.is_whitespace() {
            self.lex_whitespace();
            return true;
        }
        if self.starts_with("//") || c == '#' {
            self.lex_line_comment();
            return true;
        }
        if self.starts_with("/*") {
            self.lex_block_comment();
            return true;
        }
        if c == '\'' {
            self.lex_quoted(TokenKind::ConstantString, '\'');
            return true;
        }
        if c == '"' {
            self.lex_quoted(TokenKind::DoubleQuotedString, '"');
            return true;
        }
        if self.starts_with("<<<") {
            self.lex_heredoc();
            return true;
        }
        if c == '$' && self.peek(1).map(is_ident_start).unwrap_or(false) {
            self.lex_variable();
            return true;
        }
        if c.is_ascii_digit() {
            self.lex_number();
            return true;
        }
        if is_ident_start(c) {
            self.lex_identifier();
            return true;
        }
        if c == '(' {
            if let Some((kind, len)) = self.cast_lookahead() {
                self.take(kind, len);
                return true;
            }
        }
        self.lex_operator();
        true
    }

    fn lex_whitespace(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while self.peek(0).map(|c| c.is_whitespace()).unwrap_or(false) {
            if let Some(c) = self.advance() {
                text.push(c);
            }
        }
        self.push(TokenKind::Whitespace, text, line, column);
    }

    fn lex_line_comment(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            if self.starts_with("?>") {
                break;
            }
            text.push(self.advance().unwrap_or('\0'));
        }
        self.push(TokenKind::Comment, text, line, column);
    }

    fn lex_block_comment(&mut self) {
        let (line, column) = (self.line, self.column);
        let kind = if self.starts_with("/**") {
            TokenKind::DocComment
        } else {
            TokenKind::Comment
        };
        let mut text = String::new();
        text.push(self.advance().unwrap_or('\0'));
        text.push(self.advance().unwrap_or('\0'));
        while self.pos < self.chars.len() {
            if self.starts_with("*/") {
                text.push(self.advance().unwrap_or('\0'));
                text.push(self.advance().unwrap_or('\0'));
                break;
            }
            text.push(self.advance().unwrap_or('\0'));
        }
        self.push(kind, text, line, column);
    }

    fn lex_quoted(&mut self, kind: TokenKind, quote: char) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        text.push(self.advance().unwrap_or('\0'));
        while let Some(c) = self.peek(0) {
            if c == '\\' {
                text.push(self.advance().unwrap_or('\0'));
                if let Some(escaped) = self.advance() {
                    text.push(escaped);
                }
                continue;
            }
            text.push(self.advance().unwrap_or('\0'));
            if c == quote {
                break;
            }
        }
        self.push(kind, text, line, column);
    }

    fn lex_heredoc(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        for _ in 0..3 {
            text.push(self.advance().unwrap_or('\0'));
        }
        let mut nowdoc = false;
        if self.peek(0) == Some('\'') {
            nowdoc = true;
            text.push(self.advance().unwrap_or('\0'));
        } else if self.peek(0) == Some('"') {
            text.push(self.advance().unwrap_or('\0'));
        }
        let mut label = String::new();
        while self.peek(0).map(is_ident_char).unwrap_or(false) {
            let c = self.advance().unwrap_or('\0');
            label.push(c);
            text.push(c);
        }
        // Skip the rest of the opener line.
        while let Some(c) = self.peek(0) {
            text.push(self.advance().unwrap_or('\0'));
            if c == '\n' {
                break;
            }
        }
        // Body lines until one that starts (after indentation) with the label.
        while self.pos < self.chars.len() {
            let mut line_text = String::new();
            while let Some(c) = self.peek(0) {
                line_text.push(self.advance().unwrap_or('\0'));
                if c == '\n' {
                    break;
                }
            }
            text.push_str(&line_text);
            let trimmed = line_text.trim_start();
            if trimmed.starts_with(label.as_str()) && !label.is_empty() {
                break;
            }
        }
        let kind = if nowdoc {
            TokenKind::ConstantString
        } else {
            TokenKind::Heredoc
        };
        self.push(kind, text, line, column);
    }

    fn lex_variable(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        text.push(self.advance().unwrap_or('\0'));
        while self.peek(0).map(is_ident_char).unwrap_or(false) {
            text.push(self.advance().unwrap_or('\0'));
        }
        self.push(TokenKind::Variable, text, line, column);
    }

    fn lex_number(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        let mut is_float = false;
        if self.starts_with("0x") || self.starts_with("0X") {
            text.push(self.advance().unwrap_or('\0'));
            text.push(self.advance().unwrap_or('\0'));
            while self.peek(0).map(|c| c.is_ascii_hexdigit()).unwrap_or(false) {
                text.push(self.advance().unwrap_or('\0'));
            }
        } else {
            while let Some(c) = self.peek(0) {
                if c.is_ascii_digit() || c == '_' {
                    text.push(self.advance().unwrap_or('\0'));
                } else if c == '.' && self.peek(1).map(|d| d.is_ascii_digit()).unwrap_or(false) {
                    is_float = true;
                    text.push(self.advance().unwrap_or('\0'));
                } else if (c == 'e' || c == 'E')
                    && self.peek(1).map(|d| d.is_ascii_digit()).unwrap_or(false)
                {
                    is_float = true;
                    text.push(self.advance().unwrap_or('\0'));
                } else {
                    break;
                }
            }
        }
        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.push(kind, text, line, column);
    }

    fn lex_identifier(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while self.peek(0).map(is_ident_char).unwrap_or(false) {
            text.push(self.advance().unwrap_or('\0'));
        }
        let kind = keyword_kind(&text.to_ascii_lowercase());
        self.push(kind, text, line, column);
    }

    /// Recognizes `( int )` style casts so they become a single token.
    fn cast_lookahead(&self) -> Option<(TokenKind, usize)> {
        let mut i = 1;
        while self.peek(i) == Some(' ') || self.peek(i) == Some('\t') {
            i += 1;
        }
        let start = i;
        while self.peek(i).map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
            i += 1;
        }
        let word: String = (start..i).filter_map(|j| self.peek(j)).collect();
        while self.peek(i) == Some(' ') || self.peek(i) == Some('\t') {
            i += 1;
        }
        if self.peek(i) != Some(')') {
            return None;
        }
        let kind = match word.to_ascii_lowercase().as_str() {
            "int" | "integer" => TokenKind::IntCast,
            "float" | "double" | "real" => TokenKind::FloatCast,
            "bool" | "boolean" => TokenKind::BoolCast,
            "string" | "binary" => TokenKind::StringCast,
            "array" => TokenKind::ArrayCast,
            _ => return None,
        };
        Some((kind, i + 1))
    }

    fn lex_operator(&mut self) {
        // Longest match first.
        const THREE: &[(&str, TokenKind)] = &[
            ("===", TokenKind::Other),
            ("!==", TokenKind::Other),
            ("<=>", TokenKind::Other),
            ("**=", TokenKind::Other),
            ("??=", TokenKind::CoalesceEqual),
            ("...", TokenKind::Other),
        ];
        const TWO: &[(&str, TokenKind)] = &[
            (".=", TokenKind::ConcatEqual),
            ("+=", TokenKind::PlusEqual),
            ("-=", TokenKind::MinusEqual),
            ("*=", TokenKind::MulEqual),
            ("/=", TokenKind::DivEqual),
            ("%=", TokenKind::ModEqual),
            ("=>", TokenKind::DoubleArrow),
            ("==", TokenKind::Other),
            ("!=", TokenKind::Other),
            ("<>", TokenKind::Other),
            ("<=", TokenKind::Other),
            (">=", TokenKind::Other),
            ("&&", TokenKind::BooleanAnd),
            ("||", TokenKind::BooleanOr),
            ("??", TokenKind::Other),
            ("->", TokenKind::ObjectOperator),
            ("::", TokenKind::DoubleColon),
            ("++", TokenKind::Other),
            ("--", TokenKind::Other),
            ("<<", TokenKind::Other),
            (">>", TokenKind::Other),
            ("**", TokenKind::Other),
        ];
        for (text, kind) in THREE {
            if self.starts_with(text) {
                self.take(*kind, 3);
                return;
            }
        }
        for (text, kind) in TWO {
            if self.starts_with(text) {
                self.take(*kind, 2);
                return;
            }
        }
        let kind = match self.peek(0).unwrap_or('\0') {
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '[' => TokenKind::OpenSquare,
            ']' => TokenKind::CloseSquare,
            '{' => TokenKind::OpenCurly,
            '}' => TokenKind::CloseCurly,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Concat,
            '=' => TokenKind::Equal,
            '!' => TokenKind::BooleanNot,
            '?' => TokenKind::Ternary,
            ':' => TokenKind::TernaryElse,
            '&' => TokenKind::Ampersand,
            '-' => TokenKind::Minus,
            '+' => TokenKind::Plus,
            _ => TokenKind::Other,
        };
        self.take(kind, 1);
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c as u32 >= 0x80
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c as u32 >= 0x80
}

fn keyword_kind(lower: &str) -> TokenKind {
    match lower {
        "if" => TokenKind::If,
        "elseif" => TokenKind::ElseIf,
        "else" => TokenKind::Else,
        "foreach" => TokenKind::Foreach,
        "as" => TokenKind::As,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "function" | "fn" => TokenKind::Function,
        "echo" => TokenKind::Echo,
        "print" => TokenKind::Print,
        "exit" | "die" => TokenKind::Exit,
        "return" => TokenKind::Return,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "and" => TokenKind::LogicalAnd,
        "or" => TokenKind::LogicalOr,
        _ => TokenKind::Identifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .tokens()
            .iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_empty())
            .collect()
    }

    #[test]
    fn lexes_open_tag_and_statement() {
        let k = kinds("<?php $x = 1;");
        assert_eq!(
            k,
            vec![
                TokenKind::OpenTag,
                TokenKind::Variable,
                TokenKind::Equal,
                TokenKind::IntLiteral,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn lexes_short_echo_tag() {
        let k = kinds("<?= $x ?>");
        assert_eq!(k[0], TokenKind::OpenTagWithEcho);
        assert_eq!(k[1], TokenKind::Variable);
        assert_eq!(*k.last().unwrap(), TokenKind::CloseTag);
    }

    #[test]
    fn inline_html_before_open_tag() {
        let stream = tokenize("<p>hi</p><?php echo 1;");
        assert_eq!(stream.kind(0), Some(TokenKind::InlineHtml));
        assert_eq!(stream.kind(1), Some(TokenKind::OpenTag));
    }

    #[test]
    fn lexes_single_and_double_quoted_strings() {
        let k = kinds("<?php $a = 'x'; $b = \"y $z\";");
        assert!(k.contains(&TokenKind::ConstantString));
        assert!(k.contains(&TokenKind::DoubleQuotedString));
    }

    #[test]
    fn double_quoted_string_keeps_raw_text() {
        let stream = tokenize("<?php $a = \"id = $x\";");
        let s = stream
            .tokens()
            .iter()
            .find(|t| t.kind == TokenKind::DoubleQuotedString)
            .unwrap();
        assert_eq!(s.text, "\"id = $x\"");
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let stream = tokenize(r#"<?php $a = 'it\'s'; $b = 1;"#);
        let s = stream
            .tokens()
            .iter()
            .find(|t| t.kind == TokenKind::ConstantString)
            .unwrap();
        assert_eq!(s.text, r"'it\'s'");
    }

    #[test]
    fn lexes_heredoc_body() {
        let src = "<?php $sql = <<<SQL\nSELECT * FROM t WHERE id = $x\nSQL;\n";
        let stream = tokenize(src);
        let h = stream
            .tokens()
            .iter()
            .find(|t| t.kind == TokenKind::Heredoc)
            .unwrap();
        assert!(h.text.contains("SELECT * FROM t"));
    }

    #[test]
    fn nowdoc_is_constant_string() {
        let src = "<?php $a = <<<'TXT'\nno interpolation\nTXT;\n";
        let k = kinds(src);
        assert!(k.contains(&TokenKind::ConstantString));
        assert!(!k.contains(&TokenKind::Heredoc));
    }

    #[test]
    fn lexes_comments_as_trivia() {
        let stream = tokenize("<?php // line\n# hash\n/* block */ /** doc */ $x;");
        let trivia: Vec<TokenKind> = stream
            .tokens()
            .iter()
            .map(|t| t.kind)
            .filter(|k| matches!(k, TokenKind::Comment | TokenKind::DocComment))
            .collect();
        assert_eq!(
            trivia,
            vec![
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::DocComment,
            ]
        );
    }

    #[test]
    fn lexes_operators() {
        let k = kinds("<?php $a .= $b . $c && $d || ! $e ? 1 : 2;");
        assert!(k.contains(&TokenKind::ConcatEqual));
        assert!(k.contains(&TokenKind::Concat));
        assert!(k.contains(&TokenKind::BooleanAnd));
        assert!(k.contains(&TokenKind::BooleanOr));
        assert!(k.contains(&TokenKind::BooleanNot));
        assert!(k.contains(&TokenKind::Ternary));
        assert!(k.contains(&TokenKind::TernaryElse));
    }

    #[test]
    fn lexes_logical_keywords() {
        let k = kinds("<?php $a and $b or $c;");
        assert!(k.contains(&TokenKind::LogicalAnd));
        assert!(k.contains(&TokenKind::LogicalOr));
    }

    #[test]
    fn lexes_object_and_static_access() {
        let k = kinds("<?php $wpdb->query( Foo::BAR );");
        assert!(k.contains(&TokenKind::ObjectOperator));
        assert!(k.contains(&TokenKind::DoubleColon));
    }

    #[test]
    fn lexes_casts_as_single_tokens() {
        let k = kinds("<?php $a = (int) $b; $c = ( string ) $d;");
        assert!(k.contains(&TokenKind::IntCast));
        assert!(k.contains(&TokenKind::StringCast));
    }

    #[test]
    fn paren_is_not_a_cast() {
        let k = kinds("<?php $a = ( $b );");
        assert!(k.contains(&TokenKind::OpenParen));
        assert!(!k.contains(&TokenKind::IntCast));
    }

    #[test]
    fn die_is_exit() {
        let k = kinds("<?php die( 'x' );");
        assert!(k.contains(&TokenKind::Exit));
    }

    #[test]
    fn tracks_line_numbers() {
        let stream = tokenize("<?php\n$a = 1;\n$b = 2;\n");
        let vars: Vec<usize> = stream
            .tokens()
            .iter()
            .filter(|t| t.kind == TokenKind::Variable)
            .map(|t| t.line)
            .collect();
        assert_eq!(vars, vec![2, 3]);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let k = kinds("<?php IF ( $a ) { ECHO $b; }");
        assert!(k.contains(&TokenKind::If));
        assert!(k.contains(&TokenKind::Echo));
    }

    #[test]
    fn unknown_bytes_become_other() {
        let k = kinds("<?php $a = 1 @ 2;");
        assert!(k.contains(&TokenKind::Other));
    }
}
