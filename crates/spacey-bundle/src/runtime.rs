// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The runtime loader embedded in every bundle.
//!
//! The loader is a JavaScript IIFE taking the module registry and the entry
//! id. It evaluates modules lazily on first import and memoizes their
//! exports; a module's record is installed before its body runs, so an
//! import cycle sees the partially populated exports object instead of
//! recursing. A body that throws leaves its record installed with
//! `loaded = false` and is never re-run.
//!
//! Each body receives a handle with:
//!
//! - `import(id)` and `importDynamic(id)`, the latter falling back to a
//!   genuine `import()` for ids missing from the registry; a static import
//!   of a missing id throws naming the importing module
//! - `resolveModule(moduleId, dep)`, the string-only twin of
//!   [`crate::resolver::join`]
//! - `exports`, assignable for `export =`
//! - `meta`, the `{url, main}` object behind `import.meta`

use crate::error::{BundleError, Result};

/// Source of the built-in loader.
pub const LOADER_SOURCE: &str = include_str!("runtime/loader.js");

/// Replaced by the registry entries.
pub const MODULES_PLACEHOLDER: &str = "/*{@modules}*/";

/// Replaced by the quoted entry id.
pub const ENTRY_PLACEHOLDER: &str = "/*{@entryId}*/";

/// A loader template split around its placeholders.
///
/// Splitting once up front means module bodies are never scanned for
/// placeholder text.
#[derive(Debug, Clone, Copy)]
pub struct LoaderTemplate<'a> {
    head: &'a str,
    middle: &'a str,
    tail: &'a str,
}

impl<'a> LoaderTemplate<'a> {
    /// Split `template`. The modules placeholder must precede the entry
    /// placeholder and each must occur once.
    pub fn parse(template: &'a str) -> Result<Self> {
        let (head, rest) = template
            .split_once(MODULES_PLACEHOLDER)
            .ok_or_else(|| BundleError::Template(format!("missing {}", MODULES_PLACEHOLDER)))?;
        let (middle, tail) = rest
            .split_once(ENTRY_PLACEHOLDER)
            .ok_or_else(|| BundleError::Template(format!("missing {}", ENTRY_PLACEHOLDER)))?;

        if head.contains(ENTRY_PLACEHOLDER)
            || tail.contains(MODULES_PLACEHOLDER)
            || tail.contains(ENTRY_PLACEHOLDER)
        {
            return Err(BundleError::Template(
                "placeholders must each appear once, modules first".to_string(),
            ));
        }

        Ok(Self { head, middle, tail })
    }

    /// The built-in loader.
    pub fn builtin() -> LoaderTemplate<'static> {
        let (head, rest) = LOADER_SOURCE
            .split_once(MODULES_PLACEHOLDER)
            .unwrap_or((LOADER_SOURCE, ""));
        let (middle, tail) = rest.split_once(ENTRY_PLACEHOLDER).unwrap_or((rest, ""));
        LoaderTemplate { head, middle, tail }
    }

    /// Write the loader around `modules` and `entry` into `out`.
    pub fn render_into(&self, out: &mut String, modules: &str, entry: &str) {
        out.push_str(self.head);
        out.push_str(modules);
        out.push_str(self.middle);
        out.push_str(entry);
        out.push_str(self.tail);
    }

    /// Combined length of the fixed template text.
    pub fn len(&self) -> usize {
        self.head.len() + self.middle.len() + self.tail.len()
    }

    /// Whether the template has no fixed text at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
