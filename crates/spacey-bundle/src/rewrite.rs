// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Rewriting module import/export syntax into runtime loader calls.
//!
//! Every form recognised by [`ModuleSyntax`] becomes a call on the runtime
//! handle the module body receives. All other source text is copied through
//! byte for byte.

use crate::error::Result;
use crate::module_id::{quote, ModuleId};
use crate::syntax::{
    DynamicImport, ExportDecl, ExportSpecifier, ImportClause, ImportDecl, ModuleItem,
    ModuleSyntax,
};

/// Name of the runtime handle parameter inside every module body.
pub const RUNTIME_BINDING: &str = "__bundle";

/// Name of the per-module re-export helper.
pub const MERGE_HELPER_NAME: &str = "__bundleMerge";

/// Maps a specifier written in a module to the id it was resolved to.
pub trait SpecifierResolver {
    fn resolve(&self, module: &ModuleId, specifier: &str) -> Result<ModuleId>;
}

/// Uses every specifier verbatim as the module id.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl SpecifierResolver for IdentityResolver {
    fn resolve(&self, _module: &ModuleId, specifier: &str) -> Result<ModuleId> {
        Ok(ModuleId::new(specifier))
    }
}

/// A rewritten module body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenModule {
    pub code: String,
    /// The body calls the re-export merge helper
    pub uses_merge_helper: bool,
}

/// Source of the merge helper, inlined into each module that re-exports.
///
/// With a name list it copies `source[from]` to `exports[to]`; without one
/// it copies every enumerable key not already exported.
pub fn merge_helper() -> String {
    format!(
        "function {merge}(source, names) {{\n\
         \x20 const target = {rt}.exports;\n\
         \x20 if (names) {{\n\
         \x20   for (const [from, to] of names) target[to] = source[from];\n\
         \x20   return;\n\
         \x20 }}\n\
         \x20 for (const key in source) {{\n\
         \x20   if (!Object.prototype.hasOwnProperty.call(target, key)) target[key] = source[key];\n\
         \x20 }}\n\
         }}\n",
        merge = MERGE_HELPER_NAME,
        rt = RUNTIME_BINDING,
    )
}

/// One text substitution; `start == end` inserts.
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Rewrites one module's import/export forms.
pub struct ModuleRewriter<'a, R: SpecifierResolver + ?Sized> {
    module: &'a ModuleId,
    resolver: &'a R,
}

impl<'a, R: SpecifierResolver + ?Sized> ModuleRewriter<'a, R> {
    /// Rewriter for `module`, resolving specifiers through `resolver`.
    pub fn new(module: &'a ModuleId, resolver: &'a R) -> Self {
        Self { module, resolver }
    }

    /// Parse and rewrite `source`.
    pub fn rewrite(&self, source: &str) -> Result<RewrittenModule> {
        let syntax = ModuleSyntax::parse(self.module.as_str(), source)?;
        self.rewrite_syntax(source, &syntax)
    }

    /// Rewrite `source` using an already parsed `syntax`.
    pub fn rewrite_syntax(&self, source: &str, syntax: &ModuleSyntax) -> Result<RewrittenModule> {
        let mut edits = Vec::with_capacity(syntax.items.len());
        let mut uses_merge_helper = false;

        for item in &syntax.items {
            match item {
                ModuleItem::Import(decl) => {
                    edits.push(Edit {
                        start: decl.span.start,
                        end: decl.span.end,
                        text: self.import_statement(decl)?,
                    });
                }
                ModuleItem::DynamicImport(DynamicImport::Literal { span, source: src }) => {
                    let id = self.resolve(&src.specifier)?;
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: format!("{}.importDynamic({})", RUNTIME_BINDING, id.quoted()),
                    });
                }
                ModuleItem::DynamicImport(DynamicImport::Computed { callee, close }) => {
                    edits.push(Edit {
                        start: callee.start,
                        end: callee.end,
                        text: format!(
                            "{rt}.importDynamic({rt}.resolveModule({}, ",
                            self.module.quoted(),
                            rt = RUNTIME_BINDING,
                        ),
                    });
                    edits.push(Edit {
                        start: *close,
                        end: *close,
                        text: ")".to_string(),
                    });
                }
                ModuleItem::ImportMeta(span) => {
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: format!("{}.meta", RUNTIME_BINDING),
                    });
                }
                ModuleItem::ExportDefaultExpression { keyword } => {
                    edits.push(Edit {
                        start: keyword.start,
                        end: keyword.end,
                        text: format!("{} =", export_target("default")),
                    });
                }
                ModuleItem::ExportEquals { keyword } => {
                    edits.push(Edit {
                        start: keyword.start,
                        end: keyword.end,
                        text: format!("{}.exports =", RUNTIME_BINDING),
                    });
                }
                ModuleItem::ExportDeclaration(decl) => {
                    edits.push(strip_keyword(source, decl.keyword.start, decl.keyword.end));
                    edits.push(Edit {
                        start: decl.end,
                        end: decl.end,
                        text: declaration_bindings(decl),
                    });
                }
                ModuleItem::ExportNamed { span, specifiers } => {
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: local_exports(specifiers),
                    });
                }
                ModuleItem::ExportFrom {
                    span,
                    specifiers,
                    source: src,
                } => {
                    let id = self.resolve(&src.specifier)?;
                    let pairs: Vec<String> = specifiers
                        .iter()
                        .map(|s| format!("[{}, {}]", quote(&s.local), quote(&s.exported)))
                        .collect();
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: format!(
                            "{}({}, [{}]);",
                            MERGE_HELPER_NAME,
                            import_call(&id),
                            pairs.join(", ")
                        ),
                    });
                    uses_merge_helper = true;
                }
                ModuleItem::ExportAll { span, source: src } => {
                    let id = self.resolve(&src.specifier)?;
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: format!("{}({});", MERGE_HELPER_NAME, import_call(&id)),
                    });
                    uses_merge_helper = true;
                }
                ModuleItem::ExportAllAs {
                    span,
                    name,
                    source: src,
                } => {
                    let id = self.resolve(&src.specifier)?;
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: format!("{} = {};", export_target(name), import_call(&id)),
                    });
                }
                ModuleItem::TypeOnly { span } => {
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: String::new(),
                    });
                }
                ModuleItem::DeclarationOnly { keyword } => {
                    edits.push(strip_keyword(source, keyword.start, keyword.end));
                }
            }
        }

        Ok(RewrittenModule {
            code: apply_edits(source, edits),
            uses_merge_helper,
        })
    }

    fn resolve(&self, specifier: &str) -> Result<ModuleId> {
        self.resolver.resolve(self.module, specifier)
    }

    fn import_statement(&self, decl: &ImportDecl) -> Result<String> {
        let id = self.resolve(&decl.source.specifier)?;
        let call = import_call(&id);

        let ImportClause::Bindings {
            default,
            namespace,
            named,
        } = &decl.clause
        else {
            return Ok(format!("{};", call));
        };

        let mut statements = Vec::new();
        if let Some(name) = default {
            statements.push(format!("const {} = {}.default;", name, call));
        }
        if let Some(name) = namespace {
            statements.push(format!("const {} = {};", name, call));
        }
        if !named.is_empty() {
            let fields: Vec<String> = named
                .iter()
                .map(|b| {
                    if b.imported == b.local {
                        b.local.clone()
                    } else {
                        format!("{}: {}", property_key(&b.imported), b.local)
                    }
                })
                .collect();
            statements.push(format!("const {{{}}} = {};", fields.join(", "), call));
        }
        if statements.is_empty() {
            statements.push(format!("{};", call));
        }

        Ok(statements.join(" "))
    }
}

fn import_call(id: &ModuleId) -> String {
    format!("{}.import({})", RUNTIME_BINDING, id.quoted())
}

/// `__bundle.exports.name`, or bracketed when `name` is not an identifier.
fn export_target(name: &str) -> String {
    if is_identifier(name) {
        format!("{}.exports.{}", RUNTIME_BINDING, name)
    } else {
        format!("{}.exports[{}]", RUNTIME_BINDING, quote(name))
    }
}

fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '$' || c == '_' || unicode_xid::UnicodeXID::is_xid_start(c) => {}
        _ => return false,
    }
    chars.all(|c| c == '$' || unicode_xid::UnicodeXID::is_xid_continue(c))
}

fn local_exports(specifiers: &[ExportSpecifier]) -> String {
    specifiers
        .iter()
        .map(|s| format!("{} = {};", export_target(&s.exported), s.local))
        .collect::<Vec<_>>()
        .join(" ")
}

fn declaration_bindings(decl: &ExportDecl) -> String {
    let assignments: Vec<String> = if decl.default {
        decl.names
            .iter()
            .map(|name| format!("{} = {};", export_target("default"), name))
            .collect()
    } else {
        decl.names
            .iter()
            .map(|name| format!("{} = {};", export_target(name), name))
            .collect()
    };

    let separator = if decl.terminated { " " } else { "; " };
    format!("{}{}", separator, assignments.join(" "))
}

/// Remove `export`/`export default` and the blanks after it.
fn strip_keyword(source: &str, start: usize, end: usize) -> Edit {
    let rest = &source[end..];
    let blanks = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    Edit {
        start,
        end: end + blanks,
        text: String::new(),
    }
}

fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    // Insertions sort before a replacement starting at the same offset
    edits.sort_by_key(|e| (e.start, e.end));

    let mut out = String::with_capacity(source.len() + edits.len() * 32);
    let mut cursor = 0;
    for edit in edits {
        debug_assert!(edit.start >= cursor, "overlapping edits at {}", edit.start);
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.text);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    out
}
