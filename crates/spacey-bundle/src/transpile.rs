// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Post-rewrite transpilation.
//!
//! Bodies are lowered after import/export rewriting, so the transpiler only
//! ever sees plain statements plus TypeScript and JSX syntax.

use deno_ast::{
    EmitOptions, MediaType, ModuleSpecifier, ParseParams, SourceMapOption, TranspileModuleOptions,
    TranspileOptions,
};

use crate::error::{BundleError, Result};
use crate::module_id::ModuleId;
use crate::specifier::is_url;

/// Lowers a rewritten module body to plain JavaScript.
///
/// Runs after import/export rewriting, once per module.
pub trait Transpiler: Send + Sync {
    fn transpile(&self, module: &ModuleId, code: String) -> Result<String>;
}

/// Strips types and lowers enums, namespaces, decorators and JSX with swc.
///
/// The dialect comes from the module id's extension; ids without a known
/// one are read as TypeScript.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeScriptTranspiler;

impl Transpiler for TypeScriptTranspiler {
    fn transpile(&self, module: &ModuleId, code: String) -> Result<String> {
        let specifier = module_specifier(module)?;
        let media_type = match MediaType::from_specifier(&specifier) {
            media_type @ (MediaType::JavaScript
            | MediaType::Mjs
            | MediaType::Cjs
            | MediaType::Jsx
            | MediaType::TypeScript
            | MediaType::Mts
            | MediaType::Cts
            | MediaType::Tsx) => media_type,
            _ => MediaType::TypeScript,
        };

        let failed = |message: String| BundleError::Transpile {
            module: module.to_string(),
            message,
        };

        let parsed = deno_ast::parse_module(ParseParams {
            specifier,
            text: code.into(),
            media_type,
            capture_tokens: false,
            scope_analysis: false,
            maybe_syntax: None,
        })
        .map_err(|e| failed(e.to_string()))?;

        let emitted = parsed
            .transpile(
                &TranspileOptions::default(),
                &TranspileModuleOptions::default(),
                &EmitOptions {
                    source_map: SourceMapOption::None,
                    ..Default::default()
                },
            )
            .map_err(|e| failed(e.to_string()))?
            .into_source();

        Ok(emitted.text)
    }
}

/// Returns bodies unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transpiler for Passthrough {
    fn transpile(&self, _module: &ModuleId, code: String) -> Result<String> {
        Ok(code)
    }
}

impl<F> Transpiler for F
where
    F: Fn(&ModuleId, String) -> Result<String> + Send + Sync,
{
    fn transpile(&self, module: &ModuleId, code: String) -> Result<String> {
        self(module, code)
    }
}

/// A URL naming `module` for diagnostics and dialect detection.
fn module_specifier(module: &ModuleId) -> Result<ModuleSpecifier> {
    if is_url(module.as_str()) {
        return Ok(ModuleSpecifier::parse(module.as_str())?);
    }
    let base = ModuleSpecifier::parse("file:///")?;
    Ok(base.join(module.as_str().trim_start_matches("./"))?)
}
