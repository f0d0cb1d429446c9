// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Canonical module identities.

use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;

use crate::specifier::is_url;

/// Canonical identity of one module.
///
/// Either an absolute `http(s)` URL or a `./`-prefixed path relative to the
/// build's working directory. Two specifiers that resolve to the same
/// `ModuleId` denote the same module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Parent id used when resolving the entry point and redirect targets.
    pub const ROOT: &'static str = ".";

    /// Wrap an already-canonical id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The pseudo-module every entry specifier is resolved against.
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id names a remote module.
    pub fn is_remote(&self) -> bool {
        is_url(&self.0)
    }

    /// The id as a double-quoted JavaScript string literal.
    pub fn quoted(&self) -> String {
        quote(&self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Quote a string as a JavaScript string literal.
///
/// JSON string syntax is a subset of JavaScript string syntax, so serde_json
/// does the escaping.
pub fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
