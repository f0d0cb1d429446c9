// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexical analysis for module sources.
//!
//! The scanner understands enough JavaScript and TypeScript to never mistake
//! the inside of a string, template, regular expression or comment for code.
//! Keywords come out as plain identifiers.
//!
//! ## Structure
//!
//! - `scanner.rs` - Main `Scanner` struct that produces tokens
//! - `token.rs` - `Token`, `TokenKind` and `LexError` definitions
//!
//! ## Usage
//!
//! ```rust
//! use spacey_bundle::lexer::{tokenize, TokenKind};
//!
//! let tokens = tokenize("import a from './a.ts';").unwrap();
//! assert!(tokens[0].is_word("import"));
//! assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
//! ```

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{LexError, Span, Token, TokenKind};

/// Scan the whole source. The last token is always [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = scanner.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// 1-based line and column of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
