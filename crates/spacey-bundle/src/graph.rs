// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dependency graph construction.
//!
//! The builder walks the graph depth-first from the entry, resolving every
//! `(parent, specifier)` occurrence, recording it in the [`RedirectionMap`]
//! and loading each distinct module exactly once into the [`ModuleTable`].
//! Both live in an explicit [`GraphContext`] threaded through the walk.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, instrument};

use crate::error::{BundleError, Result};
use crate::module_id::ModuleId;
use crate::rewrite::SpecifierResolver;
use crate::syntax::ModuleSyntax;

/// Where the builder gets module identities and sources from.
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Canonical id of `specifier` imported from `parent`.
    async fn resolve(&self, parent: &ModuleId, specifier: &str) -> Result<ModuleId>;

    /// Source text of a resolved module.
    async fn load(&self, id: &ModuleId) -> Result<String>;

    /// Hint that `specifiers` of `parent` are about to be resolved.
    async fn prefetch(&self, _parent: &ModuleId, _specifiers: &[&str]) -> Result<()> {
        Ok(())
    }
}

/// A loaded, parsed module.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub source: String,
    pub syntax: ModuleSyntax,
}

impl ModuleRecord {
    /// Dependency specifiers in source order.
    pub fn dependencies(&self) -> Vec<&str> {
        self.syntax.dependencies()
    }
}

/// Loaded modules keyed by id, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    order: Vec<ModuleId>,
    records: HashMap<ModuleId, ModuleRecord>,
}

impl ModuleTable {
    /// Add a module. Ids are unique.
    pub fn insert(&mut self, id: ModuleId, record: ModuleRecord) -> Result<()> {
        if self.records.contains_key(&id) {
            return Err(BundleError::DuplicateModuleId(id.to_string()));
        }
        self.order.push(id.clone());
        self.records.insert(id, record);
        Ok(())
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Module ids in insertion order.
    pub fn ids(&self) -> &[ModuleId] {
        &self.order
    }

    /// Modules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&ModuleId, &ModuleRecord)> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).map(|record| (id, record)))
    }
}

/// `(parent, specifier)` to resolved id, one entry per occurrence.
#[derive(Debug, Clone, Default)]
pub struct RedirectionMap {
    entries: HashMap<ModuleId, HashMap<String, ModuleId>>,
}

impl RedirectionMap {
    pub fn insert(&mut self, parent: ModuleId, specifier: impl Into<String>, id: ModuleId) {
        self.entries
            .entry(parent)
            .or_default()
            .insert(specifier.into(), id);
    }

    pub fn get(&self, parent: &ModuleId, specifier: &str) -> Option<&ModuleId> {
        self.entries.get(parent)?.get(specifier)
    }

    /// Number of recorded occurrences.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpecifierResolver for RedirectionMap {
    fn resolve(&self, module: &ModuleId, specifier: &str) -> Result<ModuleId> {
        self.get(module, specifier)
            .cloned()
            .ok_or_else(|| BundleError::UnresolvedRedirectionEntry {
                module: module.to_string(),
                specifier: specifier.to_string(),
            })
    }
}

/// Mutable state of one traversal.
#[derive(Debug, Default)]
pub struct GraphContext {
    pub modules: ModuleTable,
    pub redirections: RedirectionMap,
}

/// A complete module graph.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub entry: ModuleId,
    pub modules: ModuleTable,
    pub redirections: RedirectionMap,
}

type VisitFuture<'a> = Pin<Box<dyn Future<Output = Result<ModuleId>> + Send + 'a>>;

/// Builds a [`DependencyGraph`] through a [`ModuleHost`].
pub struct DependencyGraphBuilder<'h, H: ModuleHost + ?Sized> {
    host: &'h H,
}

impl<'h, H: ModuleHost + ?Sized> DependencyGraphBuilder<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self { host }
    }

    /// Build the graph rooted at `entry`, resolved against the root.
    #[instrument(skip(self))]
    pub async fn build(&self, entry: &str) -> Result<DependencyGraph> {
        let mut ctx = GraphContext::default();
        let root = ModuleId::root();
        let entry_id = self.visit(&mut ctx, &root, entry).await?;

        debug!(
            "graph complete: {} modules, {} references",
            ctx.modules.len(),
            ctx.redirections.len()
        );

        Ok(DependencyGraph {
            entry: entry_id,
            modules: ctx.modules,
            redirections: ctx.redirections,
        })
    }

    /// Visit one occurrence of `specifier` in `parent`.
    pub fn visit<'a>(
        &'a self,
        ctx: &'a mut GraphContext,
        parent: &'a ModuleId,
        specifier: &'a str,
    ) -> VisitFuture<'a> {
        Box::pin(async move {
            let wrap = |e: BundleError| e.in_dependency(parent.as_str(), specifier);

            let id = self.host.resolve(parent, specifier).await.map_err(wrap)?;
            ctx.redirections
                .insert(parent.clone(), specifier, id.clone());

            if ctx.modules.contains(&id) {
                return Ok(id);
            }

            debug!("load {}", id);
            let source = self.host.load(&id).await.map_err(wrap)?;
            let syntax = ModuleSyntax::parse(id.as_str(), &source).map_err(wrap)?;
            let dependencies: Vec<String> = syntax
                .dependencies()
                .into_iter()
                .map(str::to_string)
                .collect();

            ctx.modules
                .insert(id.clone(), ModuleRecord { source, syntax })?;

            if !dependencies.is_empty() {
                let specifiers: Vec<&str> = dependencies.iter().map(String::as_str).collect();
                if let Err(e) = self.host.prefetch(&id, &specifiers).await {
                    debug!("prefetch for {} failed: {}", id, e);
                }
            }

            for dependency in &dependencies {
                self.visit(ctx, &id, dependency).await?;
            }

            Ok(id)
        })
    }
}
