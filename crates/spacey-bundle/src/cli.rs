// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CLI argument parsing for sbundle.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// sbundle - Bundle local and remote TypeScript/JavaScript modules into one script
#[derive(Parser, Debug)]
#[command(name = "sbundle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Remote module cache directory
    #[arg(long, global = true, env = "SBUNDLE_CACHE", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Number of concurrent downloads (default: CPU count * 2)
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub bundle: BundleArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Default log filter: `-v`/`-q` win over the configured level.
    pub fn log_filter<'a>(&self, configured: &'a str) -> &'a str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            configured
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download remote modules into the cache, replacing cached copies
    Fetch(FetchArgs),

    /// Manage the remote module cache
    Cache(CacheArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct BundleArgs {
    /// Entry module: a path or an http(s) URL
    #[arg(value_name = "ENTRY")]
    pub entry: Option<String>,

    /// Write the bundle here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Fail on uncached remote modules instead of downloading them
    #[arg(long)]
    pub no_fetch: bool,

    /// Omit the version comment at the top of the bundle
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// URLs to download
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Remove every cached module
    Clean,
    /// List cached modules
    #[command(alias = "ls")]
    List,
    /// Show cache directory path
    Path,
}
