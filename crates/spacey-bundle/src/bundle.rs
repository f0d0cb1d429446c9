// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! End-to-end bundling: graph, rewrite, transpile, emit.

use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::cache::RemoteCache;
use crate::config::Config;
use crate::emit::BundleEmitter;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::graph::{DependencyGraph, DependencyGraphBuilder};
use crate::host::ProjectHost;
use crate::module_id::ModuleId;
use crate::resolver::ModuleIdentityResolver;
use crate::rewrite::{ModuleRewriter, RewrittenModule};
use crate::specifier::is_url;
use crate::transpile::{Transpiler, TypeScriptTranspiler};

/// A finished bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// The emitted script
    pub code: String,
    /// Canonical id of the entry module
    pub entry: ModuleId,
    /// Bundled modules in emission order
    pub modules: Vec<ModuleId>,
}

/// Bundles module graphs rooted in one project directory.
pub struct Bundler {
    host: ProjectHost,
    transpiler: Box<dyn Transpiler>,
    header: bool,
}

impl Bundler {
    /// Create a bundler for the project at `root`.
    ///
    /// Remote modules come from the configured cache; uncached ones are
    /// fetched only when `config.fetch` is set.
    pub fn new(config: &Config, root: impl Into<PathBuf>) -> Result<Self> {
        let cache = RemoteCache::new(config.cache_dir());
        let fetcher = if config.fetch {
            Some(Fetcher::new(cache.clone(), config)?)
        } else {
            None
        };
        let resolver = ModuleIdentityResolver::new(cache, fetcher, config.max_redirects);

        Ok(Self {
            host: ProjectHost::new(root, resolver, config.concurrency),
            transpiler: Box::new(TypeScriptTranspiler),
            header: true,
        })
    }

    /// Replace the per-module transpiler, [`TypeScriptTranspiler`] by default.
    pub fn with_transpiler(mut self, transpiler: impl Transpiler + 'static) -> Self {
        self.transpiler = Box::new(transpiler);
        self
    }

    /// Whether the bundle opens with the version comment.
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn host(&self) -> &ProjectHost {
        &self.host
    }

    /// The specifier an entry path is resolved from.
    ///
    /// URLs pass through. Paths become `./`-relative to the project root.
    pub fn entry_specifier(&self, entry: &str) -> String {
        if is_url(entry) {
            return entry.to_string();
        }

        let path = Path::new(entry);
        let relative = if path.is_absolute() {
            pathdiff::diff_paths(path, self.host.root()).unwrap_or_else(|| path.to_path_buf())
        } else {
            path.to_path_buf()
        };

        let specifier = relative.to_string_lossy().replace('\\', "/");
        if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/') {
            specifier
        } else {
            format!("./{}", specifier)
        }
    }

    /// Traverse the graph reachable from `entry`.
    pub async fn build_graph(&self, entry: &str) -> Result<DependencyGraph> {
        let specifier = self.entry_specifier(entry);
        DependencyGraphBuilder::new(&self.host).build(&specifier).await
    }

    /// Bundle the graph reachable from `entry`.
    #[instrument(skip(self))]
    pub async fn bundle(&self, entry: &str) -> Result<Bundle> {
        let graph = self.build_graph(entry).await?;

        let mut rewritten: Vec<(ModuleId, RewrittenModule)> = Vec::with_capacity(graph.modules.len());
        for (id, record) in graph.modules.iter() {
            let mut module =
                ModuleRewriter::new(id, &graph.redirections).rewrite_syntax(&record.source, &record.syntax)?;
            module.code = self.transpiler.transpile(id, module.code)?;
            rewritten.push((id.clone(), module));
        }

        let code = BundleEmitter::default()
            .with_header(self.header)
            .emit(&graph.entry, rewritten.iter().map(|(id, m)| (id, m)))?;

        info!(
            "bundled {} modules from {} ({} bytes)",
            rewritten.len(),
            graph.entry,
            code.len()
        );

        Ok(Bundle {
            code,
            entry: graph.entry,
            modules: rewritten.into_iter().map(|(id, _)| id).collect(),
        })
    }
}
