// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bundle emission.

use std::borrow::Cow;
use std::collections::HashSet;

use crate::error::{BundleError, Result};
use crate::module_id::ModuleId;
use crate::rewrite::{merge_helper, RewrittenModule, RUNTIME_BINDING};
use crate::runtime::LoaderTemplate;

/// Comment the bundle opens with. Carries no timestamp so identical inputs
/// give identical bundles.
pub fn bundle_header() -> String {
    format!(
        "// Bundled by sbundle {}. Do not edit.\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Comment out a leading `#!` line.
pub fn neutralize_shebang(code: &str) -> Cow<'_, str> {
    if code.starts_with("#!") {
        Cow::Owned(format!("//{}", code))
    } else {
        Cow::Borrowed(code)
    }
}

/// Assembles rewritten modules and the runtime loader into one script.
#[derive(Debug, Clone, Copy)]
pub struct BundleEmitter<'a> {
    template: LoaderTemplate<'a>,
    header: bool,
}

impl Default for BundleEmitter<'static> {
    fn default() -> Self {
        Self::new(LoaderTemplate::builtin())
    }
}

impl<'a> BundleEmitter<'a> {
    /// Emitter using `template`.
    pub fn new(template: LoaderTemplate<'a>) -> Self {
        Self {
            template,
            header: true,
        }
    }

    /// Whether to open the bundle with the version comment.
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    /// Emit the bundle. `modules` are written in the order given.
    pub fn emit<'m, I>(&self, entry: &ModuleId, modules: I) -> Result<String>
    where
        I: IntoIterator<Item = (&'m ModuleId, &'m RewrittenModule)>,
    {
        let mut seen: HashSet<&ModuleId> = HashSet::new();
        let mut registry = String::new();

        for (id, module) in modules {
            if !seen.insert(id) {
                return Err(BundleError::DuplicateModuleId(id.to_string()));
            }
            if !registry.is_empty() {
                registry.push_str(",\n");
            }
            write_entry(&mut registry, id, module);
        }

        let mut out = String::with_capacity(registry.len() + self.template.len() + 128);
        if self.header {
            out.push_str(&bundle_header());
        }
        self.template
            .render_into(&mut out, &registry, &entry.quoted());
        Ok(out)
    }
}

fn write_entry(out: &mut String, id: &ModuleId, module: &RewrittenModule) {
    out.push_str(&id.quoted());
    out.push_str(": function (");
    out.push_str(RUNTIME_BINDING);
    out.push_str(") {\n");
    if module.uses_merge_helper {
        out.push_str(&merge_helper());
    }
    out.push_str(&neutralize_shebang(&module.code));
    if !module.code.ends_with('\n') {
        out.push('\n');
    }
    out.push('}');
}
