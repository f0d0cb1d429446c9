// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-bundle
//!
//! Bundles a TypeScript/JavaScript ES module graph, local files and remote
//! `http(s)` modules alike, into one self-contained script.
//!
//! - Specifiers are either URLs or `./` / `../` paths with a source
//!   extension; bare names are rejected
//! - Remote modules are fetched once into an on-disk cache, redirects
//!   included, and never re-validated
//! - Every module keeps its own scope: imports and exports are rewritten to
//!   calls on a small runtime loader embedded in the output, which evaluates
//!   modules lazily and tolerates import cycles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_bundle::{Bundler, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let bundle = Bundler::new(&config, ".")?.bundle("./main.ts").await?;
//!     std::fs::write("out.js", bundle.code)?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Bundle to stdout
//! sbundle main.ts
//!
//! # Bundle to a file, using only what is already cached
//! sbundle --no-fetch -o out.js main.ts
//!
//! # Pre-warm the cache
//! sbundle fetch https://deno.land/std/path/mod.ts
//! ```

#![warn(clippy::all)]

pub mod bundle;
pub mod cache;
pub mod config;
pub mod emit;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod host;
pub mod lexer;
pub mod module_id;
pub mod resolver;
pub mod rewrite;
pub mod runtime;
pub mod specifier;
pub mod syntax;
pub mod transpile;

// Re-exports
pub use bundle::{Bundle, Bundler};
pub use cache::{CacheEntry, CacheLookup, RemoteCache};
pub use config::Config;
pub use emit::BundleEmitter;
pub use error::{BundleError, Result};
pub use fetch::Fetcher;
pub use graph::{DependencyGraph, DependencyGraphBuilder, ModuleHost, ModuleTable, RedirectionMap};
pub use host::ProjectHost;
pub use module_id::ModuleId;
pub use resolver::ModuleIdentityResolver;
pub use rewrite::{ModuleRewriter, RewrittenModule, SpecifierResolver};
pub use specifier::{classify, SpecifierKind};
pub use transpile::{Passthrough, Transpiler, TypeScriptTranspiler};

/// Version of spacey-bundle
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
