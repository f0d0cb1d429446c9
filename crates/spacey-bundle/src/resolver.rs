// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module identity resolution.
//!
//! Resolution is split in two:
//!
//! - [`join`] / [`candidate`]: pure path and URL algebra, no I/O. The
//!   runtime loader's `resolveModule` reimplements exactly this.
//! - [`ModuleIdentityResolver`]: walks the remote cache from a candidate,
//!   collapsing redirect records and fetching on demand.

use std::collections::HashSet;
use tracing::{debug, instrument};
use url::Url;

use crate::cache::{CacheLookup, RemoteCache};
use crate::error::{BundleError, Result};
use crate::fetch::Fetcher;
use crate::module_id::ModuleId;
use crate::specifier::{classify, is_url, SpecifierKind};

/// Where a specifier points before any cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Working-directory relative file
    Local(ModuleId),
    /// Absolute URL, possibly redirected
    Remote(String),
}

/// Compute the candidate for `specifier` imported from `parent`.
///
/// 1. URL specifier: itself, serialised canonically.
/// 2. URL parent, relative specifier: URL join.
/// 3. Both relative: path join against the parent's directory.
///
/// Remote candidates never carry a fragment, so two spellings of one URL
/// always yield one id.
pub fn candidate(parent: &str, specifier: &str) -> Result<Candidate> {
    match classify(specifier) {
        SpecifierKind::Url => Ok(Candidate::Remote(canonical_url(Url::parse(specifier)?))),
        SpecifierKind::RelativePath if is_url(parent) => {
            let joined = Url::parse(parent)?.join(specifier)?;
            Ok(Candidate::Remote(canonical_url(joined)))
        }
        SpecifierKind::RelativePath => Ok(Candidate::Local(ModuleId::new(join_path(
            parent, specifier,
        )))),
        SpecifierKind::Invalid => Err(BundleError::invalid_specifier(parent, specifier)),
    }
}

fn canonical_url(mut url: Url) -> String {
    url.set_fragment(None);
    url.into()
}

/// Network-free join of `specifier` onto `parent`, without redirects.
pub fn join(parent: &str, specifier: &str) -> Result<ModuleId> {
    Ok(match candidate(parent, specifier)? {
        Candidate::Local(id) => id,
        Candidate::Remote(url) => ModuleId::new(url),
    })
}

/// `./`-prefixed normalisation of `dirname(parent)/specifier`.
///
/// `.` segments vanish and `..` pops a segment; a `..` with nothing left to
/// pop is kept so paths above the working directory stay expressible.
fn join_path(parent: &str, specifier: &str) -> String {
    let dir = match parent.rfind('/') {
        Some(idx) => &parent[..idx],
        None => ".",
    };

    let joined = format!("{}/{}", dir, specifier);
    let mut segments: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." if segments.last().is_some_and(|s| *s != "..") => {
                segments.pop();
            }
            _ => segments.push(part),
        }
    }

    format!("./{}", segments.join("/"))
}

/// Resolves `(parent, specifier)` pairs to canonical module ids.
#[derive(Clone)]
pub struct ModuleIdentityResolver {
    cache: RemoteCache,
    fetcher: Option<Fetcher>,
    max_redirects: usize,
}

impl ModuleIdentityResolver {
    /// Create a resolver. Without a fetcher, uncached URLs fail with
    /// [`BundleError::CacheMiss`].
    pub fn new(cache: RemoteCache, fetcher: Option<Fetcher>, max_redirects: usize) -> Self {
        Self {
            cache,
            fetcher,
            max_redirects,
        }
    }

    /// The remote cache consulted during resolution.
    pub fn cache(&self) -> &RemoteCache {
        &self.cache
    }

    /// The fetcher used on cache misses, if fetching is enabled.
    pub fn fetcher(&self) -> Option<&Fetcher> {
        self.fetcher.as_ref()
    }

    /// Resolve `specifier` imported from `parent` to its canonical id.
    ///
    /// Redirect records are followed by re-resolving the target against the
    /// root, so chains of any length collapse to the URL that serves content.
    #[instrument(skip(self))]
    pub async fn resolve(&self, parent: &str, specifier: &str) -> Result<ModuleId> {
        let mut next = candidate(parent, specifier)?;
        let mut fetched: HashSet<String> = HashSet::new();
        let mut hops = 0usize;

        loop {
            let url = match next {
                Candidate::Local(id) => return Ok(id),
                Candidate::Remote(url) => url,
            };

            match self.cache.lookup(&url).await? {
                CacheLookup::Content { .. } => {
                    debug!("cache hit {}", url);
                    return Ok(ModuleId::new(url));
                }
                CacheLookup::Redirect { target } => {
                    hops += 1;
                    if hops > self.max_redirects {
                        return Err(BundleError::TooManyRedirects {
                            url: specifier.to_string(),
                            limit: self.max_redirects,
                        });
                    }
                    debug!("{} redirected to {}", url, target);
                    next = candidate(ModuleId::ROOT, &target)?;
                }
                CacheLookup::Missing => {
                    let Some(fetcher) = &self.fetcher else {
                        return Err(BundleError::CacheMiss { url });
                    };
                    if !fetched.insert(url.clone()) {
                        return Err(BundleError::CacheMiss { url });
                    }
                    fetcher.fetch(&url).await?;
                    next = Candidate::Remote(url);
                }
            }
        }
    }
}
