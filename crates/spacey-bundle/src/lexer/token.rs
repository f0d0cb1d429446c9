// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Token definitions for the module scanner.

use thiserror::Error;

/// A span in the source code, representing a range of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The source text covered by this span.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// A token produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
    /// A line terminator precedes this token
    pub newline_before: bool,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span, newline_before: bool) -> Self {
        Self {
            kind,
            span,
            newline_before,
        }
    }

    /// Whether this token is the identifier or keyword `word`.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Identifier(name) if name == word)
    }

    /// The identifier or keyword text, if this is one.
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

/// The different kinds of tokens.
///
/// Keywords are not distinguished from identifiers: which words are
/// reserved depends on position, and only the module-level statements
/// need to be understood.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Identifier or keyword
    Identifier(String),
    /// Private class member (`#name`)
    PrivateIdentifier(String),
    /// String literal, with escapes processed
    String(String),
    /// Template literal without substitutions, with escapes processed
    Template(String),
    /// Template literal text up to the first `${`
    TemplateHead,
    /// Template literal text between two substitutions
    TemplateMiddle,
    /// Template literal text after the last substitution
    TemplateTail,
    /// Numeric or BigInt literal
    Number,
    /// Regular expression literal
    RegExp,

    // Punctuation
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    /// ;
    Semicolon,
    /// ,
    Comma,
    /// :
    Colon,
    /// .
    Dot,
    /// ...
    Ellipsis,
    /// ?.
    QuestionDot,
    /// ?
    Question,
    /// =
    Equal,
    /// =>
    Arrow,
    /// *
    Star,
    /// <
    LessThan,
    /// >
    GreaterThan,
    /// @
    At,
    /// Any other operator
    Operator,

    // Special
    /// Unrecognised character
    Invalid,
    /// End of input
    Eof,
}

/// A scanning failure at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LexError {
    /// Byte offset where the failing token starts
    pub offset: usize,
    /// What went wrong
    pub message: String,
}

impl LexError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}
