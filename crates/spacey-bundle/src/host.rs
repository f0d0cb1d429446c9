// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The [`ModuleHost`] used by real builds: local files under a project
//! root, remote modules through the cache.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::cache::CacheLookup;
use crate::error::{BundleError, Result};
use crate::graph::ModuleHost;
use crate::module_id::ModuleId;
use crate::resolver::{candidate, Candidate, ModuleIdentityResolver};

/// Loads modules from disk and the remote cache.
pub struct ProjectHost {
    root: PathBuf,
    resolver: ModuleIdentityResolver,
    concurrency: usize,
    in_flight: Mutex<HashSet<String>>,
}

impl ProjectHost {
    /// Host resolving local ids against `root`.
    pub fn new(root: impl Into<PathBuf>, resolver: ModuleIdentityResolver, concurrency: usize) -> Self {
        Self {
            root: root.into(),
            resolver,
            concurrency: concurrency.max(1),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolver(&self) -> &ModuleIdentityResolver {
        &self.resolver
    }

    /// Filesystem path of a local module id.
    pub fn local_path(&self, id: &ModuleId) -> PathBuf {
        let relative = id.as_str().strip_prefix("./").unwrap_or(id.as_str());
        self.root.join(relative)
    }
}

#[async_trait]
impl ModuleHost for ProjectHost {
    async fn resolve(&self, parent: &ModuleId, specifier: &str) -> Result<ModuleId> {
        self.resolver.resolve(parent.as_str(), specifier).await
    }

    async fn load(&self, id: &ModuleId) -> Result<String> {
        let bytes = if id.is_remote() {
            self.resolver.cache().read_module(id).await?
        } else {
            fs::read(self.local_path(id)).await?
        };

        String::from_utf8(bytes).map_err(|_| BundleError::NonUtf8Source(id.to_string()))
    }

    /// Fetch the uncached remote dependencies of `parent` concurrently.
    ///
    /// Failures are only logged; resolution retries the fetch and reports
    /// the error against the right specifier.
    #[instrument(skip(self, specifiers))]
    async fn prefetch(&self, parent: &ModuleId, specifiers: &[&str]) -> Result<()> {
        let Some(fetcher) = self.resolver.fetcher() else {
            return Ok(());
        };

        let mut urls = Vec::new();
        for specifier in specifiers {
            let Ok(Candidate::Remote(url)) = candidate(parent.as_str(), specifier) else {
                continue;
            };
            if !matches!(self.resolver.cache().lookup(&url).await?, CacheLookup::Missing) {
                continue;
            }
            if self.in_flight.lock().insert(url.clone()) {
                urls.push(url);
            }
        }

        if urls.is_empty() {
            return Ok(());
        }

        info!(
            "Fetching {} modules with {} concurrent connections",
            urls.len(),
            self.concurrency
        );

        let results: Vec<(String, Result<String>)> = stream::iter(urls)
            .map(|url| {
                let fetcher = fetcher.clone();
                async move {
                    let result = fetcher.fetch(&url).await;
                    (url, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (url, result) in results {
            if let Err(e) = result {
                debug!("prefetch of {} failed: {}", url, e);
            }
        }

        Ok(())
    }
}
