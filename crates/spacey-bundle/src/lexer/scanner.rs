// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The scanner that produces tokens from source text.

use unicode_xid::UnicodeXID;

use super::{LexError, Span, Token, TokenKind};

/// Words after which a `/` starts a regular expression rather than a division.
const REGEX_PRECEDING_WORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
    "extends",
];

/// A scanner that tokenizes JavaScript and TypeScript source code.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    /// One entry per open `{`; `true` when it opened a template substitution
    braces: Vec<bool>,
    regex_allowed: bool,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            braces: Vec::new(),
            regex_allowed: true,
        };
        scanner.skip_hashbang();
        scanner
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let newline_before = self.skip_whitespace_and_comments()?;

        let start = self.current_pos;

        let Some((_pos, ch)) = self.advance() else {
            return Ok(Token::new(
                TokenKind::Eof,
                Span::new(start, start),
                newline_before,
            ));
        };

        let kind = match ch {
            '{' => {
                self.braces.push(false);
                TokenKind::LeftBrace
            }
            '}' => match self.braces.pop() {
                Some(true) => self.scan_template_part(start, false)?,
                _ => TokenKind::RightBrace,
            },
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '@' => TokenKind::At,

            '.' => self.scan_dot(),
            '=' => self.scan_equal(),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '?' => self.scan_question(),
            '*' => self.scan_star(),
            '/' if self.regex_allowed => self.scan_regex(start)?,
            '/' => {
                self.eat('=');
                TokenKind::Operator
            }
            '+' | '-' | '%' | '&' | '|' | '^' | '!' | '~' => self.scan_operator(ch),

            '"' | '\'' => self.scan_string(ch, start)?,
            '`' => self.scan_template_part(start, true)?,
            '0'..='9' => self.scan_number(start),

            '#' => self.scan_private_identifier(),
            _ if is_id_start(ch) => self.scan_identifier(start),

            _ => TokenKind::Invalid,
        };

        self.regex_allowed = regex_allowed_after(&kind);

        Ok(Token::new(
            kind,
            Span::new(start, self.current_pos),
            newline_before,
        ))
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_hashbang(&mut self) {
        if !self.source.starts_with("#!") {
            return;
        }
        while let Some(ch) = self.peek() {
            if is_line_terminator(ch) {
                break;
            }
            self.advance();
        }
    }

    /// Skips trivia, reporting whether it contained a line terminator.
    fn skip_whitespace_and_comments(&mut self) -> Result<bool, LexError> {
        let mut newline = false;

        loop {
            match self.peek() {
                Some(ch) if is_line_terminator(ch) => {
                    newline = true;
                    self.advance();
                }
                Some(ch) if ch.is_whitespace() || ch == '\u{feff}' => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        let start = self.current_pos;
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        loop {
                            let Some((_, ch)) = self.advance() else {
                                return Err(LexError::new(start, "unterminated comment"));
                            };
                            if is_line_terminator(ch) {
                                newline = true;
                            }
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }

        Ok(newline)
    }

    fn scan_dot(&mut self) -> TokenKind {
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() => self.scan_number(self.current_pos - 1),
            Some('.') if self.peek_next() == Some('.') => {
                self.advance();
                self.advance();
                TokenKind::Ellipsis
            }
            _ => TokenKind::Dot,
        }
    }

    fn scan_equal(&mut self) -> TokenKind {
        if self.eat('=') {
            self.eat('=');
            TokenKind::Operator
        } else if self.eat('>') {
            TokenKind::Arrow
        } else {
            TokenKind::Equal
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.eat('<') {
            self.eat('=');
            TokenKind::Operator
        } else if self.eat('=') {
            TokenKind::Operator
        } else {
            TokenKind::LessThan
        }
    }

    // `>>` stays two tokens so nested type arguments close one level each.
    fn scan_greater_than(&mut self) -> TokenKind {
        if self.eat('=') {
            TokenKind::Operator
        } else {
            TokenKind::GreaterThan
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        match self.peek() {
            Some('.') if !self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                TokenKind::QuestionDot
            }
            Some('?') => {
                self.advance();
                self.eat('=');
                TokenKind::Operator
            }
            _ => TokenKind::Question,
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        if self.eat('*') {
            self.eat('=');
            TokenKind::Operator
        } else if self.eat('=') {
            TokenKind::Operator
        } else {
            TokenKind::Star
        }
    }

    fn scan_operator(&mut self, first: char) -> TokenKind {
        match first {
            '~' => {}
            '!' => {
                if self.eat('=') {
                    self.eat('=');
                }
            }
            '+' | '-' => {
                if !self.eat(first) {
                    self.eat('=');
                }
            }
            '&' | '|' => {
                self.eat(first);
                self.eat('=');
            }
            _ => {
                self.eat('=');
            }
        }
        TokenKind::Operator
    }

    fn scan_string(&mut self, quote: char, start: usize) -> Result<TokenKind, LexError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(LexError::new(start, "unterminated string literal")),
                Some((_, ch)) if ch == quote => break,
                Some((_, ch)) if ch == '\n' || ch == '\r' => {
                    return Err(LexError::new(start, "unterminated string literal"));
                }
                Some((_, '\\')) => self.scan_escape(&mut value),
                Some((_, ch)) => value.push(ch),
            }
        }

        Ok(TokenKind::String(value))
    }

    /// Scans template text after a backtick (`head`) or after the `}` that
    /// closes a substitution.
    fn scan_template_part(&mut self, start: usize, head: bool) -> Result<TokenKind, LexError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                None => return Err(LexError::new(start, "unterminated template literal")),
                Some((_, '`')) => {
                    return Ok(if head {
                        TokenKind::Template(value)
                    } else {
                        TokenKind::TemplateTail
                    });
                }
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    self.braces.push(true);
                    return Ok(if head {
                        TokenKind::TemplateHead
                    } else {
                        TokenKind::TemplateMiddle
                    });
                }
                Some((_, '\\')) => self.scan_escape(&mut value),
                Some((_, ch)) => value.push(ch),
            }
        }
    }

    /// Processes one escape sequence; the backslash is already consumed.
    fn scan_escape(&mut self, value: &mut String) {
        let Some((_, escaped)) = self.advance() else {
            return;
        };

        match escaped {
            'n' => value.push('\n'),
            'r' => value.push('\r'),
            't' => value.push('\t'),
            'b' => value.push('\u{8}'),
            'f' => value.push('\u{c}'),
            'v' => value.push('\u{b}'),
            '0' if !self.peek().is_some_and(|c| c.is_ascii_digit()) => value.push('\0'),
            'x' => {
                if let Some(ch) = self.scan_hex_digits(2) {
                    value.push(ch);
                }
            }
            'u' => {
                let ch = if self.eat('{') {
                    let mut digits = String::new();
                    while let Some((_, ch)) = self.advance() {
                        if ch == '}' {
                            break;
                        }
                        digits.push(ch);
                    }
                    u32::from_str_radix(&digits, 16)
                        .ok()
                        .and_then(char::from_u32)
                } else {
                    self.scan_hex_digits(4)
                };
                if let Some(ch) = ch {
                    value.push(ch);
                }
            }
            '\r' => {
                self.eat('\n');
            }
            ch if is_line_terminator(ch) => {}
            ch => value.push(ch),
        }
    }

    fn scan_hex_digits(&mut self, count: usize) -> Option<char> {
        let mut digits = String::new();
        for _ in 0..count {
            match self.peek() {
                Some(ch) if ch.is_ascii_hexdigit() => {
                    digits.push(ch);
                    self.advance();
                }
                _ => return None,
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
    }

    fn scan_regex(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut in_class = false;

        loop {
            match self.advance() {
                None => return Err(LexError::new(start, "unterminated regular expression")),
                Some((_, ch)) if is_line_terminator(ch) => {
                    return Err(LexError::new(start, "unterminated regular expression"));
                }
                Some((_, '\\')) => match self.advance() {
                    Some((_, ch)) if !is_line_terminator(ch) => {}
                    _ => return Err(LexError::new(start, "unterminated regular expression")),
                },
                Some((_, '[')) => in_class = true,
                Some((_, ']')) => in_class = false,
                Some((_, '/')) if !in_class => break,
                Some(_) => {}
            }
        }

        // Flags
        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            self.advance();
        }

        Ok(TokenKind::RegExp)
    }

    fn scan_number(&mut self, start: usize) -> TokenKind {
        let hex = matches!(
            self.source.get(start..start + 2),
            Some("0x" | "0X")
        );
        let mut prev = '0';

        while let Some(ch) = self.peek() {
            let exponent_sign = matches!(ch, '+' | '-') && matches!(prev, 'e' | 'E') && !hex;
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign {
                prev = ch;
                self.advance();
            } else {
                break;
            }
        }

        TokenKind::Number
    }

    fn scan_identifier(&mut self, start: usize) -> TokenKind {
        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            self.advance();
        }

        TokenKind::Identifier(self.source[start..self.current_pos].to_string())
    }

    fn scan_private_identifier(&mut self) -> TokenKind {
        let start = self.current_pos;
        match self.peek() {
            Some(ch) if is_id_start(ch) => {
                self.advance();
                match self.scan_identifier(start) {
                    TokenKind::Identifier(name) => TokenKind::PrivateIdentifier(name),
                    other => other,
                }
            }
            _ => TokenKind::Invalid,
        }
    }
}

fn regex_allowed_after(kind: &TokenKind) -> bool {
    match kind {
        TokenKind::Identifier(name) => REGEX_PRECEDING_WORDS.contains(&name.as_str()),
        TokenKind::PrivateIdentifier(_)
        | TokenKind::String(_)
        | TokenKind::Template(_)
        | TokenKind::TemplateTail
        | TokenKind::Number
        | TokenKind::RegExp
        | TokenKind::RightParen
        | TokenKind::RightBracket => false,
        _ => true,
    }
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_id_start(ch: char) -> bool {
    ch == '$' || ch == '_' || UnicodeXID::is_xid_start(ch)
}

fn is_id_continue(ch: char) -> bool {
    ch == '$' || ch == '\u{200c}' || ch == '\u{200d}' || UnicodeXID::is_xid_continue(ch)
}
