// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module-level syntax: the import and export forms of one source file.
//!
//! This is not a full parser. It walks the token stream, recognises every
//! import/export statement at the top level plus `import(...)` and
//! `import.meta` anywhere, and records byte spans so the rewriter can edit
//! exactly those forms and leave every other byte alone.

use crate::error::{BundleError, Result};
use crate::lexer::{line_column, tokenize, LexError, Span, Token, TokenKind};

/// Where a module form names its dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// The specifier as written, escapes decoded
    pub specifier: String,
    /// Span of the string literal
    pub span: Span,
}

/// A static import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// The whole statement, including a trailing `;`
    pub span: Span,
    pub clause: ImportClause,
    pub source: ModuleSource,
}

/// What an import declaration binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportClause {
    /// `import "X"`
    SideEffect,
    /// `import A, * as N from "X"` / `import A, {a, b as B} from "X"`
    Bindings {
        default: Option<String>,
        namespace: Option<String>,
        named: Vec<ImportBinding>,
    },
}

/// One `{imported as local}` entry of an import clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub imported: String,
    pub local: String,
}

/// One `{local as exported}` entry of an export clause.
///
/// For re-exports `local` names the binding in the source module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

/// A dynamic `import(...)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicImport {
    /// Argument is a plain string literal
    Literal {
        /// `import(` through the closing `)`
        span: Span,
        source: ModuleSource,
    },
    /// Argument is computed at run time
    Computed {
        /// `import(`
        callee: Span,
        /// Offset of the closing `)`
        close: usize,
    },
}

/// The kind of an exported declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Function,
    Class,
    Variable,
    Enum,
    Namespace,
}

/// `export <declaration>` or `export default <named declaration>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDecl {
    /// `export` (and `default`), removed on rewrite
    pub keyword: Span,
    pub kind: DeclarationKind,
    /// Names bound by the declaration, in source order
    pub names: Vec<String>,
    /// Bound to the `default` export instead of its own name
    pub default: bool,
    /// Offset just past the declaration
    pub end: usize,
    /// The declaration ends with `;` or `}`
    pub terminated: bool,
}

/// One import/export form found in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleItem {
    Import(ImportDecl),
    DynamicImport(DynamicImport),
    /// `import.meta`
    ImportMeta(Span),
    /// `export default <expression>`; the span covers `export default`
    ExportDefaultExpression { keyword: Span },
    ExportDeclaration(ExportDecl),
    /// `export = <expression>`; the span covers `export =`
    ExportEquals { keyword: Span },
    /// `export {a, b as B}`
    ExportNamed {
        span: Span,
        specifiers: Vec<ExportSpecifier>,
    },
    /// `export {a, b as B} from "X"`
    ExportFrom {
        span: Span,
        specifiers: Vec<ExportSpecifier>,
        source: ModuleSource,
    },
    /// `export * from "X"`
    ExportAll { span: Span, source: ModuleSource },
    /// `export * as ns from "X"`
    ExportAllAs {
        span: Span,
        name: String,
        source: ModuleSource,
    },
    /// TypeScript statement with no runtime meaning, erased entirely
    TypeOnly { span: Span },
    /// TypeScript declaration whose `export` keyword is dropped
    DeclarationOnly { keyword: Span },
}

impl ModuleItem {
    /// The dependency this item contributes to the module graph.
    pub fn source(&self) -> Option<&ModuleSource> {
        match self {
            ModuleItem::Import(decl) => Some(&decl.source),
            ModuleItem::DynamicImport(DynamicImport::Literal { source, .. })
            | ModuleItem::ExportFrom { source, .. }
            | ModuleItem::ExportAll { source, .. }
            | ModuleItem::ExportAllAs { source, .. } => Some(source),
            ModuleItem::DynamicImport(DynamicImport::Computed { .. })
            | ModuleItem::ImportMeta(_)
            | ModuleItem::ExportDefaultExpression { .. }
            | ModuleItem::ExportDeclaration(_)
            | ModuleItem::ExportEquals { .. }
            | ModuleItem::ExportNamed { .. }
            | ModuleItem::TypeOnly { .. }
            | ModuleItem::DeclarationOnly { .. } => None,
        }
    }
}

/// The import/export structure of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    /// Items in source order
    pub items: Vec<ModuleItem>,
}

impl ModuleSyntax {
    /// Parse `source`. `module` names the module in error messages.
    pub fn parse(module: &str, source: &str) -> Result<Self> {
        let tokens = tokenize(source).map_err(|e| syntax_error(module, source, e))?;
        let parser = Parser {
            source,
            tokens,
            pos: 0,
            depth: 0,
            items: Vec::new(),
        };
        let items = parser
            .parse()
            .map_err(|e| syntax_error(module, source, e))?;
        Ok(Self { items })
    }

    /// Dependency specifiers in source order, each listed once.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for source in self.items.iter().filter_map(ModuleItem::source) {
            if !out.contains(&source.specifier.as_str()) {
                out.push(&source.specifier);
            }
        }
        out
    }
}

fn syntax_error(module: &str, source: &str, err: LexError) -> BundleError {
    let (line, column) = line_column(source, err.offset);
    BundleError::Syntax {
        module: module.to_string(),
        line,
        column,
        message: err.message,
    }
}

/// Identifiers that start a type rather than finish one.
const TYPE_OPERATORS: &[&str] = &[
    "keyof", "typeof", "infer", "readonly", "unique", "is", "asserts", "extends", "new",
];

/// What follows `export` when it starts a declaration.
struct DeclShape {
    kind: DeclarationKind,
    names: Vec<String>,
    /// Token index just past the declaration
    end: usize,
    terminated: bool,
    /// A function signature without a body
    overload: bool,
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Brace depth; module forms only exist at depth 0
    depth: usize,
    items: Vec<ModuleItem>,
}

type ParseResult<T> = std::result::Result<T, LexError>;

impl Parser<'_> {
    fn parse(mut self) -> ParseResult<Vec<ModuleItem>> {
        while self.kind(self.pos) != &TokenKind::Eof {
            let after_member = self.pos > 0
                && matches!(
                    self.kind(self.pos - 1),
                    TokenKind::Dot | TokenKind::QuestionDot
                );

            if !after_member && self.is_word(self.pos, "import") {
                self.parse_import_keyword()?;
                continue;
            }
            if !after_member && self.depth == 0 && self.is_word(self.pos, "export") {
                self.parse_export()?;
                continue;
            }

            match self.kind(self.pos) {
                TokenKind::LeftBrace => self.depth += 1,
                TokenKind::RightBrace => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }

        Ok(self.items)
    }

    // Token access

    fn token(&self, idx: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[idx.min(last)]
    }

    fn kind(&self, idx: usize) -> &TokenKind {
        &self.token(idx).kind
    }

    fn is_word(&self, idx: usize, word: &str) -> bool {
        self.token(idx).is_word(word)
    }

    fn word(&self, idx: usize) -> Option<&str> {
        self.token(idx).word()
    }

    fn text(&self, idx: usize) -> &str {
        self.token(idx).span.text(self.source)
    }

    fn string(&self, idx: usize) -> Option<ModuleSource> {
        match self.kind(idx) {
            TokenKind::String(value) => Some(ModuleSource {
                specifier: value.clone(),
                span: self.token(idx).span,
            }),
            _ => None,
        }
    }

    /// An identifier or string used as an import/export name.
    fn module_export_name(&self, idx: usize) -> Option<String> {
        match self.kind(idx) {
            TokenKind::Identifier(name) | TokenKind::String(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn error(&self, idx: usize, message: impl Into<String>) -> LexError {
        LexError::new(self.token(idx).span.start, message)
    }

    fn expect_word(&self, idx: usize, word: &str) -> ParseResult<()> {
        if self.is_word(idx, word) {
            Ok(())
        } else {
            Err(self.error(idx, format!("expected '{}'", word)))
        }
    }

    fn expect_source(&self, idx: usize) -> ParseResult<ModuleSource> {
        self.string(idx)
            .ok_or_else(|| self.error(idx, "expected a module specifier string"))
    }

    fn span_between(&self, first: usize, end: usize) -> Span {
        Span::new(self.token(first).span.start, self.token(end - 1).span.end)
    }

    // Lookahead

    /// Index of the bracket closing the one at `idx`.
    fn matching(&self, idx: usize) -> ParseResult<usize> {
        let mut depth = 0usize;
        let mut i = idx;
        loop {
            match self.kind(i) {
                TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::TemplateHead => depth += 1,
                TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
                | TokenKind::TemplateTail => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                TokenKind::Eof => return Err(self.error(idx, "unbalanced brackets")),
                _ => {}
            }
            i += 1;
        }
    }

    /// Index just past a `<...>` type parameter list starting at `idx`.
    fn skip_angles(&self, idx: usize) -> ParseResult<usize> {
        let mut angle = 0usize;
        let mut i = idx;
        loop {
            match self.kind(i) {
                TokenKind::LessThan => angle += 1,
                TokenKind::GreaterThan => {
                    angle -= 1;
                    if angle == 0 {
                        return Ok(i + 1);
                    }
                }
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => {
                    i = self.matching(i)?;
                }
                TokenKind::Eof => return Err(self.error(idx, "unterminated type parameters")),
                _ => {}
            }
            i += 1;
        }
    }

    /// Whether automatic semicolon insertion ends a statement before `idx`.
    fn asi_boundary(&self, idx: usize) -> bool {
        if idx == 0 || !self.token(idx).newline_before {
            return false;
        }
        self.can_end_expression(idx - 1) && !self.continues_expression(idx)
    }

    fn can_end_expression(&self, idx: usize) -> bool {
        match self.kind(idx) {
            TokenKind::Identifier(_)
            | TokenKind::PrivateIdentifier(_)
            | TokenKind::String(_)
            | TokenKind::Template(_)
            | TokenKind::TemplateTail
            | TokenKind::Number
            | TokenKind::RegExp
            | TokenKind::RightParen
            | TokenKind::RightBracket
            | TokenKind::RightBrace => true,
            TokenKind::Operator => matches!(self.text(idx), "++" | "--"),
            _ => false,
        }
    }

    fn continues_expression(&self, idx: usize) -> bool {
        match self.kind(idx) {
            TokenKind::Dot
            | TokenKind::QuestionDot
            | TokenKind::Question
            | TokenKind::Colon
            | TokenKind::Equal
            | TokenKind::Arrow
            | TokenKind::Comma
            | TokenKind::Star
            | TokenKind::LessThan
            | TokenKind::GreaterThan => true,
            TokenKind::Operator => !matches!(self.text(idx), "++" | "--" | "!" | "~"),
            TokenKind::Identifier(word) => {
                matches!(word.as_str(), "as" | "satisfies" | "instanceof" | "in")
            }
            _ => false,
        }
    }

    /// Index of the first token after an expression starting at `idx`.
    fn skip_expression(&self, idx: usize, stop_at_comma: bool) -> usize {
        let mut depth = 0usize;
        let mut i = idx;
        loop {
            let kind = self.kind(i);
            if *kind == TokenKind::Eof {
                return i;
            }
            if depth == 0 {
                match kind {
                    TokenKind::Semicolon => return i,
                    TokenKind::Comma if stop_at_comma => return i,
                    _ if i > idx && self.asi_boundary(i) => return i,
                    TokenKind::LessThan if stop_at_comma => {
                        if let Some(end) = self.type_arguments_end(i) {
                            i = end;
                            continue;
                        }
                    }
                    _ => {}
                }
            }
            match kind {
                TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::TemplateHead => depth += 1,
                TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
                | TokenKind::TemplateTail => {
                    if depth == 0 {
                        return i;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Index past the type argument or parameter list opened by the `<` at
    /// `idx`.
    ///
    /// `None` unless every token up to the matching `>` can appear in a type
    /// and the list is followed by something a type list can precede, so
    /// `a < b, c = d` stays a comparison.
    fn type_arguments_end(&self, idx: usize) -> Option<usize> {
        let mut angle = 0usize;
        let mut depth = 0usize;
        let mut i = idx;
        loop {
            match self.kind(i) {
                TokenKind::Eof => return None,
                TokenKind::LessThan => angle += 1,
                TokenKind::GreaterThan => {
                    angle -= 1;
                    if angle == 0 {
                        if depth > 0 {
                            return None;
                        }
                        break;
                    }
                }
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => depth += 1,
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::RightBrace => {
                    depth = depth.checked_sub(1)?;
                }
                _ if depth > 0 => {}
                TokenKind::Identifier(_)
                | TokenKind::String(_)
                | TokenKind::Number
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::Arrow => {}
                TokenKind::Operator if matches!(self.text(i), "|" | "&") => {}
                _ => return None,
            }
            i += 1;
        }

        let next = i + 1;
        let follows = matches!(
            self.kind(next),
            TokenKind::LeftParen
                | TokenKind::Template(_)
                | TokenKind::TemplateHead
                | TokenKind::Comma
                | TokenKind::Semicolon
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
                | TokenKind::Dot
                | TokenKind::QuestionDot
                | TokenKind::Eof
        ) || self.asi_boundary(next);
        follows.then_some(next)
    }

    /// End of the statement starting at `idx`: the index past it and
    /// whether it was closed by `;`.
    fn statement_end(&self, idx: usize) -> (usize, bool) {
        let end = self.skip_expression(idx, false);
        if *self.kind(end) == TokenKind::Semicolon {
            (end + 1, true)
        } else {
            (end, false)
        }
    }

    /// Index of the first token after a type annotation starting at `idx`.
    ///
    /// With `brace_ends`, a `{` that cannot start an object type ends the
    /// type: it opens a function body.
    fn skip_type(&self, idx: usize, brace_ends: bool) -> usize {
        let mut depth = 0usize;
        let mut angle = 0usize;
        let mut i = idx;
        loop {
            let kind = self.kind(i);
            if *kind == TokenKind::Eof {
                return i;
            }
            if depth == 0 && angle == 0 {
                match kind {
                    TokenKind::Equal | TokenKind::Comma | TokenKind::Semicolon => return i,
                    TokenKind::LeftBrace
                        if brace_ends && i > idx && self.completes_type(i - 1) =>
                    {
                        return i;
                    }
                    _ if i > idx && self.asi_boundary(i) => return i,
                    _ => {}
                }
            }
            match kind {
                TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::LeftBrace
                | TokenKind::TemplateHead => depth += 1,
                TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
                | TokenKind::TemplateTail => {
                    if depth == 0 {
                        return i;
                    }
                    depth -= 1;
                }
                TokenKind::LessThan => angle += 1,
                TokenKind::GreaterThan => angle = angle.saturating_sub(1),
                _ => {}
            }
            i += 1;
        }
    }

    fn completes_type(&self, idx: usize) -> bool {
        match self.kind(idx) {
            TokenKind::Identifier(word) => !TYPE_OPERATORS.contains(&word.as_str()),
            TokenKind::GreaterThan
            | TokenKind::RightBracket
            | TokenKind::RightParen
            | TokenKind::RightBrace
            | TokenKind::String(_)
            | TokenKind::Template(_)
            | TokenKind::TemplateTail
            | TokenKind::Number => true,
            _ => false,
        }
    }

    /// Index past an optional `with {...}` / `assert {...}` clause.
    fn skip_import_attributes(&self, idx: usize) -> ParseResult<usize> {
        let keyword = self.is_word(idx, "with")
            || (self.is_word(idx, "assert") && !self.token(idx).newline_before);
        if keyword && *self.kind(idx + 1) == TokenKind::LeftBrace {
            Ok(self.matching(idx + 1)? + 1)
        } else {
            Ok(idx)
        }
    }

    /// Index past an optional `;`.
    fn finish_statement(&self, idx: usize) -> usize {
        if *self.kind(idx) == TokenKind::Semicolon {
            idx + 1
        } else {
            idx
        }
    }

    /// Parse `{a, b as c, type T}` at `idx`.
    ///
    /// Returns `(name, alias, type_only)` entries and the index past `}`.
    fn specifier_list(&self, idx: usize) -> ParseResult<(Vec<(String, String, bool)>, usize)> {
        let mut entries = Vec::new();
        let mut i = idx + 1;

        loop {
            if *self.kind(i) == TokenKind::RightBrace {
                return Ok((entries, i + 1));
            }

            let type_only = self.is_word(i, "type")
                && self.module_export_name(i + 1).is_some()
                && !self.is_word(i + 1, "as");
            if type_only {
                i += 1;
            }

            let name = self
                .module_export_name(i)
                .ok_or_else(|| self.error(i, "expected a binding name"))?;
            i += 1;

            let alias = if self.is_word(i, "as") {
                let alias = self
                    .module_export_name(i + 1)
                    .ok_or_else(|| self.error(i + 1, "expected a name after 'as'"))?;
                i += 2;
                alias
            } else {
                name.clone()
            };

            entries.push((name, alias, type_only));

            match self.kind(i) {
                TokenKind::Comma => i += 1,
                TokenKind::RightBrace => {}
                _ => return Err(self.error(i, "expected ',' or '}'")),
            }
        }
    }

    /// Names bound by the binding pattern at `idx`, and the index past it.
    fn binding_names(&self, idx: usize, names: &mut Vec<String>) -> ParseResult<usize> {
        match self.kind(idx) {
            TokenKind::Identifier(name) => {
                names.push(name.clone());
                Ok(idx + 1)
            }
            TokenKind::LeftBrace => {
                let mut i = idx + 1;
                loop {
                    match self.kind(i) {
                        TokenKind::RightBrace => return Ok(i + 1),
                        TokenKind::Ellipsis => i = self.binding_names(i + 1, names)?,
                        _ => {
                            let key = self.word(i).map(str::to_string);
                            i = if *self.kind(i) == TokenKind::LeftBracket {
                                self.matching(i)? + 1
                            } else {
                                i + 1
                            };
                            if *self.kind(i) == TokenKind::Colon {
                                i = self.binding_names(i + 1, names)?;
                            } else if let Some(key) = key {
                                names.push(key);
                            }
                            if *self.kind(i) == TokenKind::Equal {
                                i = self.skip_expression(i + 1, true);
                            }
                        }
                    }
                    match self.kind(i) {
                        TokenKind::Comma => i += 1,
                        TokenKind::RightBrace => return Ok(i + 1),
                        _ => return Err(self.error(i, "malformed object pattern")),
                    }
                }
            }
            TokenKind::LeftBracket => {
                let mut i = idx + 1;
                loop {
                    match self.kind(i) {
                        TokenKind::RightBracket => return Ok(i + 1),
                        TokenKind::Comma => {
                            i += 1;
                            continue;
                        }
                        TokenKind::Ellipsis => i = self.binding_names(i + 1, names)?,
                        _ => {
                            i = self.binding_names(i, names)?;
                            if *self.kind(i) == TokenKind::Equal {
                                i = self.skip_expression(i + 1, true);
                            }
                        }
                    }
                    match self.kind(i) {
                        TokenKind::Comma => i += 1,
                        TokenKind::RightBracket => return Ok(i + 1),
                        _ => return Err(self.error(i, "malformed array pattern")),
                    }
                }
            }
            _ => Err(self.error(idx, "expected a binding name")),
        }
    }

    /// Names declared by `const`/`let`/`var` declarators starting at `idx`.
    fn variable_names(&self, idx: usize) -> ParseResult<Vec<String>> {
        let mut names = Vec::new();
        let mut i = idx;
        let mut first = true;

        loop {
            let mut found = Vec::new();
            let next = match self.binding_names(i, &mut found) {
                Ok(next) => next,
                Err(e) if first => return Err(e),
                Err(_) => break,
            };

            let mut j = next;
            if *self.kind(j) == TokenKind::Operator && self.text(j) == "!" {
                j += 1;
            }
            if *self.kind(j) == TokenKind::Colon {
                j = self.skip_type(j + 1, false);
            }
            if *self.kind(j) == TokenKind::Equal {
                j = self.skip_expression(j + 1, true);
            }

            // A comma inside unparenthesised type arguments, as in
            // `f<A, B>(x)`, is not a declarator separator.
            let well_formed = matches!(
                self.kind(j),
                TokenKind::Comma | TokenKind::Semicolon | TokenKind::Eof | TokenKind::RightBrace
            ) || self.asi_boundary(j);
            if !well_formed && !first {
                break;
            }

            names.extend(found);
            first = false;

            if *self.kind(j) == TokenKind::Comma {
                i = j + 1;
            } else {
                break;
            }
        }

        Ok(names)
    }

    /// Shape of the declaration starting at `idx`, if there is one.
    fn declaration(&self, idx: usize, default: bool) -> ParseResult<Option<DeclShape>> {
        let mut i = idx;

        while *self.kind(i) == TokenKind::At {
            i = self.skip_decorator(i)?;
        }

        if self.is_word(i, "async")
            && self.is_word(i + 1, "function")
            && !self.token(i + 1).newline_before
        {
            i += 1;
        }
        if self.is_word(i, "abstract") && self.is_word(i + 1, "class") {
            i += 1;
        }

        match self.word(i) {
            Some("function") => self.function_shape(i).map(Some),
            Some("class") => self.class_shape(i).map(Some),
            Some("const") if !default && self.is_word(i + 1, "enum") => {
                self.block_shape(i + 1, DeclarationKind::Enum).map(Some)
            }
            Some("const" | "let" | "var") if !default => {
                let names = self.variable_names(i + 1)?;
                let (end, terminated) = self.statement_end(i);
                Ok(Some(DeclShape {
                    kind: DeclarationKind::Variable,
                    names,
                    end,
                    terminated,
                    overload: false,
                }))
            }
            Some("enum") if !default => self.block_shape(i, DeclarationKind::Enum).map(Some),
            Some("namespace" | "module")
                if !default && matches!(self.kind(i + 1), TokenKind::Identifier(_)) =>
            {
                self.block_shape(i, DeclarationKind::Namespace).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn skip_decorator(&self, idx: usize) -> ParseResult<usize> {
        let mut i = idx + 1;
        if *self.kind(i) == TokenKind::LeftParen {
            return Ok(self.matching(i)? + 1);
        }
        loop {
            if self.word(i).is_none() {
                return Err(self.error(i, "malformed decorator"));
            }
            i += 1;
            if *self.kind(i) == TokenKind::Dot {
                i += 1;
                continue;
            }
            if *self.kind(i) == TokenKind::LeftParen {
                i = self.matching(i)? + 1;
            }
            return Ok(i);
        }
    }

    fn function_shape(&self, idx: usize) -> ParseResult<DeclShape> {
        let mut i = idx + 1;
        if *self.kind(i) == TokenKind::Star {
            i += 1;
        }

        let mut names = Vec::new();
        if let Some(name) = self.word(i) {
            names.push(name.to_string());
            i += 1;
        }

        if *self.kind(i) == TokenKind::LessThan {
            i = self.skip_angles(i)?;
        }
        if *self.kind(i) != TokenKind::LeftParen {
            return Err(self.error(i, "expected a parameter list"));
        }
        i = self.matching(i)? + 1;

        if *self.kind(i) == TokenKind::Colon {
            i = self.skip_type(i + 1, true);
        }

        if *self.kind(i) == TokenKind::LeftBrace {
            return Ok(DeclShape {
                kind: DeclarationKind::Function,
                names,
                end: self.matching(i)? + 1,
                terminated: true,
                overload: false,
            });
        }

        let end = self.finish_statement(i);
        Ok(DeclShape {
            kind: DeclarationKind::Function,
            names,
            end,
            terminated: end > i,
            overload: true,
        })
    }

    fn class_shape(&self, idx: usize) -> ParseResult<DeclShape> {
        let mut i = idx + 1;

        let mut names = Vec::new();
        if let Some(name) = self.word(i) {
            if name != "extends" && name != "implements" {
                names.push(name.to_string());
                i += 1;
            }
        }

        let mut angle = 0usize;
        loop {
            match self.kind(i) {
                TokenKind::LeftBrace if angle == 0 => break,
                TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::LeftBrace => {
                    i = self.matching(i)?;
                }
                TokenKind::LessThan => angle += 1,
                TokenKind::GreaterThan => angle = angle.saturating_sub(1),
                TokenKind::Eof => return Err(self.error(idx, "expected a class body")),
                _ => {}
            }
            i += 1;
        }

        Ok(DeclShape {
            kind: DeclarationKind::Class,
            names,
            end: self.matching(i)? + 1,
            terminated: true,
            overload: false,
        })
    }

    /// `enum E {...}` or `namespace N.M {...}`; binds the first name.
    fn block_shape(&self, idx: usize, kind: DeclarationKind) -> ParseResult<DeclShape> {
        let name = self
            .word(idx + 1)
            .ok_or_else(|| self.error(idx + 1, "expected a name"))?
            .to_string();

        let mut i = idx + 2;
        while *self.kind(i) != TokenKind::LeftBrace {
            if !matches!(self.kind(i), TokenKind::Dot | TokenKind::Identifier(_)) {
                return Err(self.error(i, "expected '{'"));
            }
            i += 1;
        }

        Ok(DeclShape {
            kind,
            names: vec![name],
            end: self.matching(i)? + 1,
            terminated: true,
            overload: false,
        })
    }

    // Statements

    /// `import` at `self.pos`, not preceded by a member access.
    fn parse_import_keyword(&mut self) -> ParseResult<()> {
        let idx = self.pos;

        match self.kind(idx + 1) {
            TokenKind::LeftParen => return self.parse_dynamic_import(),
            TokenKind::Dot => {
                if self.is_word(idx + 2, "meta") {
                    let span = self.span_between(idx, idx + 3);
                    self.items.push(ModuleItem::ImportMeta(span));
                    self.pos = idx + 3;
                } else {
                    self.pos = idx + 1;
                }
                return Ok(());
            }
            _ => {}
        }

        if self.depth == 0 {
            self.parse_import_declaration()
        } else {
            self.pos += 1;
            Ok(())
        }
    }

    fn parse_dynamic_import(&mut self) -> ParseResult<()> {
        let idx = self.pos;
        let open = idx + 1;
        let close = self.matching(open)?;

        // `import(...) {` is a method named `import`
        if *self.kind(close + 1) == TokenKind::LeftBrace {
            self.pos = idx + 1;
            return Ok(());
        }

        let literal = match self.kind(open + 1) {
            TokenKind::String(value) | TokenKind::Template(value) => Some(value.clone()),
            _ => None,
        };

        match literal {
            Some(specifier)
                if matches!(
                    self.kind(open + 2),
                    TokenKind::RightParen | TokenKind::Comma
                ) =>
            {
                self.items
                    .push(ModuleItem::DynamicImport(DynamicImport::Literal {
                        span: self.span_between(idx, close + 1),
                        source: ModuleSource {
                            specifier,
                            span: self.token(open + 1).span,
                        },
                    }));
                self.pos = close + 1;
            }
            _ => {
                self.items
                    .push(ModuleItem::DynamicImport(DynamicImport::Computed {
                        callee: self.span_between(idx, open + 1),
                        close: self.token(close).span.start,
                    }));
                // Keep scanning the argument for nested forms
                self.pos = open + 1;
            }
        }

        Ok(())
    }

    fn parse_import_declaration(&mut self) -> ParseResult<()> {
        let start = self.pos;
        let mut i = start + 1;

        if let Some(source) = self.string(i) {
            let end = self.finish_statement(self.skip_import_attributes(i + 1)?);
            self.items.push(ModuleItem::Import(ImportDecl {
                span: self.span_between(start, end),
                clause: ImportClause::SideEffect,
                source,
            }));
            self.pos = end;
            return Ok(());
        }

        let mut type_only = false;
        if self.is_word(i, "type")
            && !(self.is_word(i + 1, "from") && self.string(i + 2).is_some())
            && matches!(
                self.kind(i + 1),
                TokenKind::Identifier(_) | TokenKind::LeftBrace | TokenKind::Star
            )
        {
            type_only = true;
            i += 1;
        }

        // `import A = require("x")` and `import A = N.M` stay as written
        if self.word(i).is_some() && *self.kind(i + 1) == TokenKind::Equal {
            self.pos = i + 1;
            return Ok(());
        }

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();
        let mut type_specifiers = 0usize;
        let mut has_list = false;

        if let Some(name) = self.word(i) {
            if !(name == "from" && self.string(i + 1).is_some()) {
                default = Some(name.to_string());
                i += 1;
                if *self.kind(i) == TokenKind::Comma {
                    i += 1;
                }
            }
        }

        match self.kind(i) {
            TokenKind::Star => {
                self.expect_word(i + 1, "as")?;
                let name = self
                    .word(i + 2)
                    .ok_or_else(|| self.error(i + 2, "expected a namespace name"))?;
                namespace = Some(name.to_string());
                i += 3;
            }
            TokenKind::LeftBrace => {
                let (entries, next) = self.specifier_list(i)?;
                has_list = true;
                for (imported, local, is_type) in entries {
                    if is_type {
                        type_specifiers += 1;
                    } else {
                        named.push(ImportBinding { imported, local });
                    }
                }
                i = next;
            }
            _ => {}
        }

        if default.is_none() && namespace.is_none() && !has_list {
            return Err(self.error(i, "malformed import declaration"));
        }

        self.expect_word(i, "from")?;
        let source = self.expect_source(i + 1)?;
        let end = self.finish_statement(self.skip_import_attributes(i + 2)?);
        let span = self.span_between(start, end);

        let elided = default.is_none()
            && namespace.is_none()
            && named.is_empty()
            && type_specifiers > 0;

        if type_only || elided {
            self.items.push(ModuleItem::TypeOnly { span });
        } else {
            self.items.push(ModuleItem::Import(ImportDecl {
                span,
                clause: ImportClause::Bindings {
                    default,
                    namespace,
                    named,
                },
                source,
            }));
        }

        self.pos = end;
        Ok(())
    }

    fn parse_export(&mut self) -> ParseResult<()> {
        let start = self.pos;
        let keyword = self.token(start).span;
        let i = start + 1;

        if self.is_word(i, "default") {
            let keyword = Span::new(keyword.start, self.token(i).span.end);
            let item = match self.declaration(i + 1, true)? {
                Some(shape) if !shape.names.is_empty() && !shape.overload => {
                    ModuleItem::ExportDeclaration(ExportDecl {
                        keyword,
                        kind: shape.kind,
                        names: shape.names,
                        default: true,
                        end: self.token(shape.end - 1).span.end,
                        terminated: shape.terminated,
                    })
                }
                Some(shape) if shape.overload => ModuleItem::DeclarationOnly { keyword },
                _ if self.is_word(i + 1, "interface") => ModuleItem::DeclarationOnly { keyword },
                _ => ModuleItem::ExportDefaultExpression { keyword },
            };
            self.items.push(item);
            self.pos = i + 1;
            return Ok(());
        }

        match self.kind(i) {
            TokenKind::Equal => {
                let keyword = Span::new(keyword.start, self.token(i).span.end);
                self.items.push(ModuleItem::ExportEquals { keyword });
                self.pos = i + 1;
            }
            TokenKind::Star => self.parse_export_star(start)?,
            TokenKind::LeftBrace => self.parse_export_list(start, i, false)?,
            _ if self.is_word(i, "type")
                && matches!(self.kind(i + 1), TokenKind::LeftBrace | TokenKind::Star) =>
            {
                if *self.kind(i + 1) == TokenKind::LeftBrace {
                    self.parse_export_list(start, i + 1, true)?;
                } else {
                    let (end, _) = self.statement_end(i + 1);
                    self.items.push(ModuleItem::TypeOnly {
                        span: self.span_between(start, end),
                    });
                    self.pos = end;
                }
            }
            _ if self.is_word(i, "as") && self.is_word(i + 1, "namespace") => {
                let (end, _) = self.statement_end(i);
                self.items.push(ModuleItem::TypeOnly {
                    span: self.span_between(start, end),
                });
                self.pos = end;
            }
            _ if matches!(
                self.word(i),
                Some("type" | "interface" | "declare" | "import")
            ) =>
            {
                self.items.push(ModuleItem::DeclarationOnly { keyword });
                self.pos = i;
            }
            _ => {
                let shape = self
                    .declaration(i, false)?
                    .ok_or_else(|| self.error(i, "unsupported export form"))?;
                let item = if shape.overload {
                    ModuleItem::DeclarationOnly { keyword }
                } else if shape.names.is_empty() {
                    return Err(self.error(i, "exported declaration needs a name"));
                } else {
                    ModuleItem::ExportDeclaration(ExportDecl {
                        keyword,
                        kind: shape.kind,
                        names: shape.names,
                        default: false,
                        end: self.token(shape.end - 1).span.end,
                        terminated: shape.terminated,
                    })
                };
                self.items.push(item);
                self.pos = i;
            }
        }

        Ok(())
    }

    /// `export * from "X"` / `export * as ns from "X"`, star at `start + 1`.
    fn parse_export_star(&mut self, start: usize) -> ParseResult<()> {
        let mut i = start + 2;

        let mut name = None;
        if self.is_word(i, "as") {
            name = Some(
                self.module_export_name(i + 1)
                    .ok_or_else(|| self.error(i + 1, "expected a name after 'as'"))?,
            );
            i += 2;
        }

        self.expect_word(i, "from")?;
        let source = self.expect_source(i + 1)?;
        let end = self.finish_statement(self.skip_import_attributes(i + 2)?);
        let span = self.span_between(start, end);

        self.items.push(match name {
            Some(name) => ModuleItem::ExportAllAs { span, name, source },
            None => ModuleItem::ExportAll { span, source },
        });
        self.pos = end;
        Ok(())
    }

    /// `export [type] {...} [from "X"]`, list opening at `open`.
    fn parse_export_list(&mut self, start: usize, open: usize, type_only: bool) -> ParseResult<()> {
        let (entries, mut i) = self.specifier_list(open)?;

        let all_types = !entries.is_empty() && entries.iter().all(|(_, _, is_type)| *is_type);
        let specifiers: Vec<ExportSpecifier> = entries
            .into_iter()
            .filter(|(_, _, is_type)| !is_type)
            .map(|(local, exported, _)| ExportSpecifier { local, exported })
            .collect();

        let mut source = None;
        if self.is_word(i, "from") {
            source = Some(self.expect_source(i + 1)?);
            i = self.skip_import_attributes(i + 2)?;
        }
        let end = self.finish_statement(i);
        let span = self.span_between(start, end);

        let item = if type_only || all_types {
            ModuleItem::TypeOnly { span }
        } else {
            match source {
                Some(source) => ModuleItem::ExportFrom {
                    span,
                    specifiers,
                    source,
                },
                None => ModuleItem::ExportNamed { span, specifiers },
            }
        };

        self.items.push(item);
        self.pos = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ModuleSyntax {
        ModuleSyntax::parse("./test.ts", source).unwrap()
    }

    fn only(source: &str) -> ModuleItem {
        let mut syntax = parse(source);
        assert_eq!(syntax.items.len(), 1, "items: {:?}", syntax.items);
        syntax.items.remove(0)
    }

    fn binding(imported: &str, local: &str) -> ImportBinding {
        ImportBinding {
            imported: imported.to_string(),
            local: local.to_string(),
        }
    }

    fn export_names(source: &str) -> Vec<String> {
        match only(source) {
            ModuleItem::ExportDeclaration(decl) => decl.names,
            other => panic!("not a declaration: {other:?}"),
        }
    }

    #[test]
    fn test_import_forms() {
        match only("import { a, b as B } from \"./some.ts\";") {
            ModuleItem::Import(decl) => {
                assert_eq!(decl.source.specifier, "./some.ts");
                assert_eq!(decl.span, Span::new(0, 38));
                assert_eq!(
                    decl.clause,
                    ImportClause::Bindings {
                        default: None,
                        namespace: None,
                        named: vec![binding("a", "a"), binding("b", "B")],
                    }
                );
            }
            other => panic!("unexpected item: {other:?}"),
        }

        match only("import A, * as N from './x.js'") {
            ModuleItem::Import(decl) => assert_eq!(
                decl.clause,
                ImportClause::Bindings {
                    default: Some("A".to_string()),
                    namespace: Some("N".to_string()),
                    named: vec![],
                }
            ),
            other => panic!("unexpected item: {other:?}"),
        }

        match only("import './polyfill.js'") {
            ModuleItem::Import(decl) => assert_eq!(decl.clause, ImportClause::SideEffect),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_import_attributes_are_part_of_statement() {
        let source = "import data from './d.js' with { type: 'json' };\nfoo();";
        match only(source) {
            ModuleItem::Import(decl) => assert_eq!(decl.span.text(source), &source[..48]),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_type_only_imports() {
        assert!(matches!(
            only("import type { A } from './types.ts';"),
            ModuleItem::TypeOnly { .. }
        ));
        assert!(matches!(
            only("import { type A, type B } from './types.ts';"),
            ModuleItem::TypeOnly { .. }
        ));

        match only("import { type A, b } from './mixed.ts';") {
            ModuleItem::Import(decl) => assert_eq!(
                decl.clause,
                ImportClause::Bindings {
                    default: None,
                    namespace: None,
                    named: vec![binding("b", "b")],
                }
            ),
            other => panic!("unexpected item: {other:?}"),
        }

        // A default import that happens to be called `type`
        match only("import type from './t.js';") {
            ModuleItem::Import(decl) => assert!(matches!(
                decl.clause,
                ImportClause::Bindings { default: Some(ref d), .. } if d == "type"
            )),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_dynamic_imports() {
        let source = "const a = await import('./a.ts');\nfunction f(x) { return import(x + '.ts'); }";
        let syntax = parse(source);
        assert_eq!(syntax.items.len(), 2);

        match &syntax.items[0] {
            ModuleItem::DynamicImport(DynamicImport::Literal { span, source: src }) => {
                assert_eq!(span.text(source), "import('./a.ts')");
                assert_eq!(src.specifier, "./a.ts");
            }
            other => panic!("unexpected item: {other:?}"),
        }

        match &syntax.items[1] {
            ModuleItem::DynamicImport(DynamicImport::Computed { callee, close }) => {
                assert_eq!(callee.text(source), "import(");
                assert_eq!(&source[*close..*close + 1], ")");
                assert_eq!(&source[callee.end..*close], "x + '.ts'");
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_not_dynamic_imports() {
        let source = "loader.import('./a.ts');\nclass A { import(x) { return x; } }\nconst s = \"import('./b.ts')\"; // import('./c.ts')\nconst r = /import\\('.\\/d.ts'\\)/;";
        assert!(parse(source).items.is_empty());
    }

    #[test]
    fn test_import_meta() {
        let source = "console.log(import.meta.url);";
        match only(source) {
            ModuleItem::ImportMeta(span) => assert_eq!(span.text(source), "import.meta"),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_export_default_forms() {
        let source = "export default function main() {}\n";
        match only(source) {
            ModuleItem::ExportDeclaration(decl) => {
                assert!(decl.default);
                assert_eq!(decl.kind, DeclarationKind::Function);
                assert_eq!(decl.names, vec!["main".to_string()]);
                assert_eq!(decl.keyword.text(source), "export default");
                assert_eq!(decl.end, 33);
            }
            other => panic!("unexpected item: {other:?}"),
        }

        for anonymous in [
            "export default function () {}",
            "export default class extends Base {}",
            "export default { a: 1 };",
            "export default 42",
        ] {
            assert!(
                matches!(only(anonymous), ModuleItem::ExportDefaultExpression { .. }),
                "{anonymous}"
            );
        }
    }

    #[test]
    fn test_export_declarations() {
        assert_eq!(export_names("export function f() {}"), vec!["f"]);
        assert_eq!(export_names("export async function* gen() {}"), vec!["gen"]);
        assert_eq!(
            export_names("export class C extends Base<T> implements I {}"),
            vec!["C"]
        );
        assert_eq!(export_names("export abstract class A {}"), vec!["A"]);
        assert_eq!(export_names("export enum Color { Red, Green }"), vec!["Color"]);
        assert_eq!(export_names("export const enum E { A }"), vec!["E"]);
        assert_eq!(export_names("export namespace NS.Inner {}"), vec!["NS"]);
        assert_eq!(export_names("export const x = 1, y = 2;"), vec!["x", "y"]);
        assert_eq!(
            export_names("export const { a, b: [c, d = 1], ...rest } = obj;"),
            vec!["a", "c", "d", "rest"]
        );
        assert_eq!(
            export_names("export const store = create<State, Action>(reducer);"),
            vec!["store"]
        );
        assert_eq!(
            export_names("export let value: Map<string, number> = new Map();"),
            vec!["value"]
        );
    }

    #[test]
    fn test_declarators_after_type_arguments() {
        assert_eq!(
            export_names("export const f = <T,>(x: T): T => x, g = 2;"),
            vec!["f", "g"]
        );
        assert_eq!(
            export_names("export const m = new Map<string, number>(), n = 0;"),
            vec!["m", "n"]
        );
        assert_eq!(
            export_names("export const id = make<A, { k: B }>, other = 1;"),
            vec!["id", "other"]
        );
        assert_eq!(export_names("export const p = a < b, q = c > d;"), vec!["p", "q"]);
    }

    #[test]
    fn test_variable_declaration_end() {
        let source = "export const x = 1\nconsole.log(x)\n";
        match &parse(source).items[0] {
            ModuleItem::ExportDeclaration(decl) => {
                assert_eq!(&source[..decl.end], "export const x = 1");
                assert!(!decl.terminated);
            }
            other => panic!("unexpected item: {other:?}"),
        }

        let source = "export let f = () =>\n  compute(\n    1,\n  );\nrun();";
        match &parse(source).items[0] {
            ModuleItem::ExportDeclaration(decl) => {
                assert!(source[..decl.end].ends_with(");"));
                assert!(decl.terminated);
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_function_return_type_with_object_type() {
        let source = "export function f(): { a: number } { return { a: 1 }; }";
        match only(source) {
            ModuleItem::ExportDeclaration(decl) => assert_eq!(decl.end, source.len()),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_export_lists() {
        match only("export { a, b as B };") {
            ModuleItem::ExportNamed { specifiers, .. } => {
                assert_eq!(specifiers.len(), 2);
                assert_eq!(specifiers[1].local, "b");
                assert_eq!(specifiers[1].exported, "B");
            }
            other => panic!("unexpected item: {other:?}"),
        }

        match only("export { default as X, y } from './y.ts'") {
            ModuleItem::ExportFrom {
                specifiers, source, ..
            } => {
                assert_eq!(source.specifier, "./y.ts");
                assert_eq!(specifiers[0].local, "default");
                assert_eq!(specifiers[0].exported, "X");
            }
            other => panic!("unexpected item: {other:?}"),
        }

        assert!(matches!(
            only("export * from './all.ts';"),
            ModuleItem::ExportAll { .. }
        ));
        match only("export * as ns from './ns.ts';") {
            ModuleItem::ExportAllAs { name, .. } => assert_eq!(name, "ns"),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_typescript_only_exports() {
        assert!(matches!(
            only("export type { T } from './t.ts';"),
            ModuleItem::TypeOnly { .. }
        ));
        assert!(matches!(
            only("export interface Point { x: number }"),
            ModuleItem::DeclarationOnly { .. }
        ));
        assert!(matches!(
            only("export type Id = string;"),
            ModuleItem::DeclarationOnly { .. }
        ));
        assert!(matches!(
            only("export declare const VERSION: string;"),
            ModuleItem::DeclarationOnly { .. }
        ));

        let syntax = parse("export function f(a: string): void;\nexport function f(a: any) {}");
        assert!(matches!(syntax.items[0], ModuleItem::DeclarationOnly { .. }));
        assert!(matches!(syntax.items[1], ModuleItem::ExportDeclaration(_)));
    }

    #[test]
    fn test_export_equals() {
        let source = "export = { a: 1 };";
        match only(source) {
            ModuleItem::ExportEquals { keyword } => assert_eq!(keyword.text(source), "export ="),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn test_nested_exports_are_ignored() {
        let source = "declare module 'x' { export const a: number; }\nnamespace N { export const b = 1; }";
        assert!(parse(source).items.is_empty());
    }

    #[test]
    fn test_dynamic_import_inside_exported_function() {
        let syntax = parse("export async function load() { return import('./lazy.ts'); }");
        assert_eq!(syntax.items.len(), 2);
        assert!(matches!(syntax.items[0], ModuleItem::ExportDeclaration(_)));
        assert_eq!(syntax.dependencies(), vec!["./lazy.ts"]);
    }

    #[test]
    fn test_dependencies_in_source_order_deduplicated() {
        let syntax = parse(
            "import a from './a.ts';\nexport * from './b.ts';\nimport('./a.ts');\nexport { c } from './c.ts';\nimport type { T } from './types.ts';",
        );
        assert_eq!(syntax.dependencies(), vec!["./a.ts", "./b.ts", "./c.ts"]);
    }

    #[test]
    fn test_syntax_error_position() {
        let err = ModuleSyntax::parse("./bad.ts", "const a = 1;\nconst b = 'oops;\n").unwrap_err();
        match err {
            BundleError::Syntax {
                module,
                line,
                column,
                ..
            } => {
                assert_eq!(module, "./bad.ts");
                assert_eq!(line, 2);
                assert_eq!(column, 11);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
