// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module specifier classification.

/// Extensions a relative specifier must end with.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs",
];

/// Shape of a specifier string, independent of any parent module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `http://...` or `https://...`
    Url,
    /// `./...` or `../...` ending in a source extension
    RelativePath,
    /// Anything else (bare names, absolute paths, missing extension)
    Invalid,
}

/// Classify a specifier.
pub fn classify(specifier: &str) -> SpecifierKind {
    if is_url(specifier) {
        return SpecifierKind::Url;
    }

    let rest = specifier
        .strip_prefix("./")
        .or_else(|| specifier.strip_prefix("../"));

    match rest {
        Some(rest) if has_source_extension(rest) => SpecifierKind::RelativePath,
        _ => SpecifierKind::Invalid,
    }
}

/// Check for an http(s) scheme with a non-empty remainder.
pub fn is_url(specifier: &str) -> bool {
    specifier
        .strip_prefix("https://")
        .or_else(|| specifier.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty())
}

fn has_source_extension(path: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| {
        path.strip_suffix(ext)
            .is_some_and(|stem| !stem.is_empty() && !stem.ends_with('/'))
    })
}
