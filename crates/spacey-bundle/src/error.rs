// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the bundler.

use thiserror::Error;

/// Result type for bundler operations.
pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors that can abort a build.
///
/// Every variant is build-fatal: there is no partial output and no retry
/// beyond following a redirect chain inside a single fetch.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Specifier is neither an http(s) URL nor a `./` / `../` source path
    #[error("invalid module specifier '{specifier}' imported from '{parent}'")]
    InvalidSpecifier { parent: String, specifier: String },

    /// Remote module is not in the cache and fetching is disabled
    #[error("module '{url}' is not cached; run `sbundle fetch {url}` first or allow fetching")]
    CacheMiss { url: String },

    /// Remote server answered with an error status
    #[error("fetching '{url}' failed with status {status}")]
    FetchFailed { url: String, status: u16 },

    /// Remote server answered with something that is not a script
    #[error("unacceptable content-type for '{url}': '{content_type}'")]
    UnacceptableContentType { url: String, content_type: String },

    /// A 3xx response without a Location header
    #[error("redirect response ({status}) from '{url}' has no Location header")]
    RedirectWithoutLocation { url: String, status: u16 },

    /// Redirect chain exceeded the configured hop limit
    #[error("too many redirects while fetching '{url}' (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },

    /// Rewriter saw a specifier the traversal never recorded
    #[error("internal error: no resolved module for '{specifier}' in '{module}'")]
    UnresolvedRedirectionEntry { module: String, specifier: String },

    /// Two modules claimed the same identity
    #[error("internal error: duplicate module id '{0}'")]
    DuplicateModuleId(String),

    /// Source text could not be tokenized or parsed
    #[error("syntax error in '{module}' at {line}:{column}: {message}")]
    Syntax {
        module: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Rewritten module body could not be lowered to JavaScript
    #[error("failed to transpile '{module}': {message}")]
    Transpile { module: String, message: String },

    /// Module source is not valid UTF-8
    #[error("module '{0}' is not valid UTF-8")]
    NonUtf8Source(String),

    /// Failure while loading one dependency of the graph
    #[error("failed to load '{specifier}' imported from '{parent}'")]
    Dependency {
        parent: String,
        specifier: String,
        #[source]
        source: Box<BundleError>,
    },

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Loader template lacks its placeholders
    #[error("invalid loader template: {0}")]
    Template(String),
}

impl BundleError {
    /// Create an invalid specifier error.
    pub fn invalid_specifier(parent: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self::InvalidSpecifier {
            parent: parent.into(),
            specifier: specifier.into(),
        }
    }

    /// Attach the `(parent, specifier)` pair that was being loaded.
    ///
    /// Already-wrapped errors keep the innermost pair, which is the one that
    /// actually failed.
    pub fn in_dependency(self, parent: impl Into<String>, specifier: impl Into<String>) -> Self {
        match self {
            err @ Self::Dependency { .. } => err,
            other => Self::Dependency {
                parent: parent.into(),
                specifier: specifier.into(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through dependency wrappers.
    pub fn root_cause(&self) -> &BundleError {
        match self {
            Self::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
